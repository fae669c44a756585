use crate::cache::FileCache;
use crate::config::Config;
use crate::dispatch::BackendPool;
use crate::fetcher::MediaFetcher;
use crate::fetcher::ytdlp::YtDlpFetcher;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling on peer forwards
    pub http_client: Client,
    /// Local media file cache
    pub cache: FileCache,
    /// External media-fetch capability
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Peer pool with its selection strategy
    pub pool: Arc<BackendPool>,
}

impl AppState {
    /// Create an AppState with the production `yt-dlp` fetcher
    pub fn new(config: Config) -> Self {
        let fetcher = Arc::new(YtDlpFetcher::from_config(&config));
        Self::with_fetcher(config, fetcher)
    }

    /// Create an AppState with an injected fetcher (used by tests)
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Self {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        let cache = FileCache::new(config.cache_dir.clone());
        let pool = Arc::new(BackendPool::from_config(&config));

        Self {
            config: Arc::new(config),
            http_client,
            cache,
            fetcher,
            pool,
        }
    }
}
