//! Content-addressed cache of fetched media files.
//!
//! Files live in a single directory and are keyed by
//! `sanitized-title _ media-id _ quality`, so repeated requests for the same
//! media resolve to the same path and a second request short-circuits to the
//! existing file. Entries are reclaimed by the eviction sweep in
//! [`crate::evictor`]; a file may vanish between an existence check and a
//! subsequent open, which surfaces as `NotFound`, never a crash.

use crate::error::{FetchrError, Result};
use crate::fetcher::Quality;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Characters never allowed in the title component of a cache key.
///
/// Covers path separators and filesystem-reserved characters, so a derived
/// path can never escape the cache directory via an untrusted title.
pub const RESERVED_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Replace every reserved character with `_` and trim surrounding whitespace
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Deterministic identity of a cached artifact.
///
/// Idempotent: the same (title, media id, quality) triple always produces
/// the same key and therefore the same file path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(title: &str, media_id: &str, quality: Quality) -> Self {
        Self(format!(
            "{}_{}_{}",
            sanitize_title(title),
            media_id,
            quality.label()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final on-disk filename (merged output is always mp4)
    pub fn filename(&self) -> String {
        format!("{}.mp4", self.0)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for a cached media file
#[derive(Clone, Debug)]
pub struct CachedFile {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Directory-backed file cache.
///
/// Holds no in-memory state — existence is defined by file presence, so the
/// serving path and the evictor need no shared locking discipline.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Ensure the cache directory exists
    pub async fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!(cache_dir = %self.dir.display(), "cache initialized");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve the final path for a key. Pure — never touches disk.
    pub fn resolve_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.filename())
    }

    /// Output template handed to the fetch tool, which substitutes the
    /// container extension before the merge step produces the final mp4.
    pub fn output_template(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", key.as_str()))
    }

    /// True if a regular file for this key is present
    pub async fn exists(&self, key: &CacheKey) -> bool {
        fs::metadata(self.resolve_path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Stat the cached file for a key, if present
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedFile> {
        let path = self.resolve_path(key);
        let meta = fs::metadata(&path).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        let created_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Some(CachedFile {
            key: key.clone(),
            path,
            size_bytes: meta.len(),
            created_at,
        })
    }

    /// Resolve a client-supplied filename to a path inside the cache
    /// directory. Rejects anything that could traverse outside it.
    ///
    /// Sanitized titles never contain separators, so `..` without a
    /// separator is an ordinary filename character sequence, not traversal.
    pub fn file_path(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            return None;
        }
        Some(self.dir.join(filename))
    }

    /// Open a cached file for serving.
    ///
    /// `NotFound` covers both "never created" and "evicted after creation" —
    /// a late caller cannot tell the difference, nor does it need to.
    pub async fn open(&self, filename: &str) -> Result<(fs::File, u64)> {
        let path = self
            .file_path(filename)
            .ok_or_else(|| FetchrError::NotFound(filename.to_string()))?;
        let file = fs::File::open(&path)
            .await
            .map_err(|_| FetchrError::NotFound(filename.to_string()))?;
        let len = file
            .metadata()
            .await
            .map_err(|_| FetchrError::NotFound(filename.to_string()))?
            .len();
        Ok((file, len))
    }
}
