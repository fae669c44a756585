//! TTL-based eviction of cached media files.
//!
//! A single background task sweeps the cache directory on a fixed interval
//! and deletes regular files older than the configured TTL. The TTL is a
//! soft lower bound on retention — a file lives at least until the first
//! sweep after its TTL elapses, with at most one interval of slack.
//!
//! The sweeper holds no lock shared with request handling. A file may
//! legitimately vanish between a handler's existence check and its open;
//! the serving path treats that as `NotFound`.

use crate::cache::FileCache;
use crate::metrics;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one sweep cycle. Deletion problems are swallowed, not
/// propagated — they only show up in `failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Directory entries examined
    pub scanned: usize,
    /// Files deleted this cycle
    pub evicted: usize,
    /// Deletions that failed (file vanished concurrently, permissions)
    pub failed: usize,
}

/// Run the eviction loop until `cancel` is triggered.
///
/// Started once in `server::start`; sleeps `interval` between sweeps.
pub async fn run(cache: FileCache, ttl: Duration, interval: Duration, cancel: CancellationToken) {
    info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "cache evictor started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cache evictor shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                let stats = sweep(&cache, ttl).await;
                if stats.evicted > 0 || stats.failed > 0 {
                    debug!(
                        scanned = stats.scanned,
                        evicted = stats.evicted,
                        failed = stats.failed,
                        "eviction sweep completed"
                    );
                }
            }
        }
    }
}

/// Sweep the cache directory once, deleting files older than `ttl`.
///
/// The entry set is snapshotted by the directory iterator at sweep start;
/// files created mid-sweep are picked up next cycle. Best-effort throughout:
/// an unreadable directory yields empty stats, and individual failures never
/// abort the sweep.
pub async fn sweep(cache: &FileCache, ttl: Duration) -> SweepStats {
    let mut stats = SweepStats::default();

    let mut entries = match fs::read_dir(cache.dir()).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, dir = %cache.dir().display(), "failed to read cache dir for sweep");
            return stats;
        }
    };

    let now = SystemTime::now();

    while let Ok(Some(entry)) = entries.next_entry().await {
        stats.scanned += 1;

        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };

        let age = match meta.modified().ok().and_then(|m| now.duration_since(m).ok()) {
            Some(age) => age,
            // Clock skew put the mtime in the future — leave it alone
            None => continue,
        };

        if age > ttl {
            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(file = %entry.path().display(), age_secs = age.as_secs(), "evicted expired file");
                    stats.evicted += 1;
                }
                Err(e) => {
                    debug!(file = %entry.path().display(), error = %e, "eviction delete failed");
                    stats.failed += 1;
                }
            }
        }
    }

    if stats.evicted > 0 {
        metrics::record_evictions(stats.evicted as u64);
    }

    stats
}
