//! Media fetching: quality tiers, the external fetch-tool seam, and the
//! cache-backed fetch adapter.
//!
//! The actual retrieval and transcoding is a black box behind the
//! [`MediaFetcher`] trait; [`fetch_to_cache`] wraps it with the key
//! derivation, the cache-hit short circuit, and post-fetch verification.

pub mod ytdlp;

use crate::cache::{CacheKey, CachedFile, FileCache};
use crate::error::{FetchrError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Requested quality ceiling for a download.
///
/// Each tier selects the best video stream within the height constraint,
/// merged with the best audio, degrading to the best combined stream when no
/// stream matches. `Best` is the fallback for unrecognized quality strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Quality {
    P360,
    #[default]
    P720,
    P1080,
    P1440,
    P2160,
    /// Highest available, no height constraint
    Best,
}

impl Quality {
    /// Parse a quality tier label; `None` for anything unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "360p" => Some(Quality::P360),
            "720p" => Some(Quality::P720),
            "1080p" => Some(Quality::P1080),
            "1440p" => Some(Quality::P1440),
            "2160p" => Some(Quality::P2160),
            _ => None,
        }
    }

    /// Resolve a raw request parameter: absent/empty falls back to 720p,
    /// unrecognized falls back to best-effort highest. Policy, not an error.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            None => Quality::P720,
            Some(s) if s.trim().is_empty() => Quality::P720,
            Some(s) => Quality::parse(s.trim()).unwrap_or(Quality::Best),
        }
    }

    /// Label used in cache keys and forwarded requests
    pub fn label(&self) -> &'static str {
        match self {
            Quality::P360 => "360p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::P2160 => "2160p",
            Quality::Best => "best",
        }
    }

    /// Format selector handed to the fetch tool
    pub fn format_selector(&self) -> &'static str {
        match self {
            Quality::P360 => "bestvideo[height<=360]+bestaudio/best[height<=360]",
            Quality::P720 => "bestvideo[height<=720]+bestaudio/best[height<=720]",
            Quality::P1080 => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
            Quality::P1440 => "bestvideo[height<=1440]+bestaudio/best[height<=1440]",
            Quality::P2160 => "bestvideo[height<=2160]+bestaudio/best[height<=2160]",
            Quality::Best => "bestvideo+bestaudio/best",
        }
    }
}

/// Metadata probed from the source without downloading
#[derive(Clone, Debug, Deserialize)]
pub struct MediaMetadata {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub id: String,
}

fn default_title() -> String {
    "video".to_string()
}

/// External media-fetch capability.
///
/// Implementations turn a URL and a quality ceiling into a local file.
/// Failures come back as typed errors — nothing here may panic into the
/// request path.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Query title and media id without downloading
    async fn probe(&self, url: &str) -> Result<MediaMetadata>;

    /// Materialize the media under `output_template` (extension placeholder
    /// included; the merged result lands next to it as `.mp4`)
    async fn materialize(&self, url: &str, quality: Quality, output_template: &Path)
    -> Result<()>;
}

/// Result of a local fetch: the cached file plus whether it was already there
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub file: CachedFile,
    pub cache_hit: bool,
}

/// Fetch a media URL into the cache, deduplicating by cache key.
///
/// Probes metadata first to derive the deterministic key; an existing file
/// for that key short-circuits the fetch entirely. Otherwise the fetcher
/// materializes the file and its presence is verified afterwards — a clean
/// tool exit without output is a distinct failure
/// ([`FetchrError::MissingOutput`]).
pub async fn fetch_to_cache(
    fetcher: &dyn MediaFetcher,
    cache: &FileCache,
    url: &str,
    quality: Quality,
) -> Result<FetchOutcome> {
    let meta = fetcher.probe(url).await?;
    let key = CacheKey::new(&meta.title, &meta.id, quality);

    if let Some(file) = cache.lookup(&key).await {
        info!(key = %key, "cache hit - skipping fetch");
        metrics::record_cache_hit();
        return Ok(FetchOutcome {
            file,
            cache_hit: true,
        });
    }
    metrics::record_cache_miss();

    info!(key = %key, url, "fetching media");
    fetcher
        .materialize(url, quality, &cache.output_template(&key))
        .await?;

    match cache.lookup(&key).await {
        Some(file) => Ok(FetchOutcome {
            file,
            cache_hit: false,
        }),
        // Tool exited cleanly but the merge produced nothing
        None => Err(FetchrError::MissingOutput(key.filename())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn parse_accepts_all_tiers() {
        assert_eq!(Quality::parse("360p"), Some(Quality::P360));
        assert_eq!(Quality::parse("720p"), Some(Quality::P720));
        assert_eq!(Quality::parse("1080p"), Some(Quality::P1080));
        assert_eq!(Quality::parse("1440p"), Some(Quality::P1440));
        assert_eq!(Quality::parse("2160p"), Some(Quality::P2160));
    }

    #[test]
    fn parse_rejects_unknown_labels() {
        assert_eq!(Quality::parse("999p"), None);
        assert_eq!(Quality::parse("best"), None);
        assert_eq!(Quality::parse(""), None);
    }

    #[test]
    fn resolve_defaults_to_720p() {
        assert_eq!(Quality::resolve(None), Quality::P720);
        assert_eq!(Quality::resolve(Some("")), Quality::P720);
        assert_eq!(Quality::resolve(Some("  ")), Quality::P720);
    }

    #[test]
    fn resolve_falls_back_to_best_for_unrecognized() {
        assert_eq!(Quality::resolve(Some("999p")), Quality::Best);
        assert_eq!(Quality::resolve(Some("ultra")), Quality::Best);
    }

    #[test]
    fn resolve_keeps_valid_tiers() {
        assert_eq!(Quality::resolve(Some("1080p")), Quality::P1080);
        assert_eq!(Quality::resolve(Some(" 2160p ")), Quality::P2160);
    }

    #[test]
    fn format_selector_constrains_height_per_tier() {
        assert_eq!(
            Quality::P360.format_selector(),
            "bestvideo[height<=360]+bestaudio/best[height<=360]"
        );
        assert_eq!(
            Quality::P2160.format_selector(),
            "bestvideo[height<=2160]+bestaudio/best[height<=2160]"
        );
        assert_eq!(Quality::Best.format_selector(), "bestvideo+bestaudio/best");
    }

    #[test]
    fn metadata_defaults_for_missing_fields() {
        let meta: MediaMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.title, "video");
        assert_eq!(meta.id, "");
    }

    #[test]
    fn metadata_ignores_extra_fields() {
        let meta: MediaMetadata = serde_json::from_str(
            r#"{"title": "A Video", "id": "xyz", "duration": 120, "uploader": "someone"}"#,
        )
        .unwrap();
        assert_eq!(meta.title, "A Video");
        assert_eq!(meta.id, "xyz");
    }

    /// Fetcher double that writes a file on materialize and counts calls
    struct RecordingFetcher {
        title: String,
        id: String,
        probes: AtomicUsize,
        downloads: AtomicUsize,
        produce_output: bool,
    }

    impl RecordingFetcher {
        fn new(title: &str, id: &str) -> Self {
            Self {
                title: title.to_string(),
                id: id.to_string(),
                probes: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
                produce_output: true,
            }
        }
    }

    #[async_trait]
    impl MediaFetcher for RecordingFetcher {
        async fn probe(&self, _url: &str) -> Result<MediaMetadata> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(MediaMetadata {
                title: self.title.clone(),
                id: self.id.clone(),
            })
        }

        async fn materialize(
            &self,
            _url: &str,
            _quality: Quality,
            output_template: &Path,
        ) -> Result<()> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.produce_output {
                let final_path = output_template
                    .to_str()
                    .expect("utf-8 path in tests")
                    .replace("%(ext)s", "mp4");
                tokio::fs::write(final_path, b"fake media").await.unwrap();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_fetch_downloads_and_caches() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let fetcher = RecordingFetcher::new("My Video", "abc123");

        let outcome = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P720)
            .await
            .unwrap();

        assert!(!outcome.cache_hit);
        assert_eq!(outcome.file.key.filename(), "My Video_abc123_720p.mp4");
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
        assert!(outcome.file.path.exists());
    }

    #[tokio::test]
    async fn second_fetch_is_a_cache_hit_with_no_download() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let fetcher = RecordingFetcher::new("My Video", "abc123");

        let first = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P720)
            .await
            .unwrap();
        let second = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P720)
            .await
            .unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(
            fetcher.downloads.load(Ordering::SeqCst),
            1,
            "cache hit must not re-download"
        );
        assert_eq!(first.file.path, second.file.path);
    }

    #[tokio::test]
    async fn different_quality_is_a_different_artifact() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let fetcher = RecordingFetcher::new("My Video", "abc123");

        let hd = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P1080)
            .await
            .unwrap();
        let sd = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P360)
            .await
            .unwrap();

        assert_ne!(hd.file.path, sd.file.path);
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn silent_tool_failure_surfaces_as_missing_output() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let mut fetcher = RecordingFetcher::new("My Video", "abc123");
        fetcher.produce_output = false;

        let err = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P720)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchrError::MissingOutput(_)));
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reserved_characters_in_title_stay_inside_cache_dir() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf());
        let fetcher = RecordingFetcher::new("../evil: <title>", "abc123");

        let outcome = fetch_to_cache(&fetcher, &cache, "https://media.example/v", Quality::P720)
            .await
            .unwrap();

        assert!(outcome.file.path.starts_with(dir.path()));
        assert!(outcome.file.path.exists());
    }
}
