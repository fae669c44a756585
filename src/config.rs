use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Backend selection strategy for dispatching download requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Cycle through backends in a fixed order using a shared cursor
    RoundRobin,
    /// Pick a uniformly random backend per call, repeats allowed
    Random,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Directory holding fetched media files
    pub cache_dir: PathBuf,
    /// Peer instances to forward requests to; empty means local fetch mode
    pub backends: Vec<String>,
    /// Backend selection strategy: roundrobin (default) or random
    pub dispatch_strategy: DispatchStrategy,
    /// Minimum lifetime of a cached file before it becomes evictable (default: 600)
    pub file_ttl_secs: u64,
    /// Period of the eviction sweep (default: 30)
    pub sweep_interval_secs: u64,
    /// Per-backend timeout when forwarding a download request (default: 300)
    pub forward_timeout_secs: u64,
    /// Concurrent fragment downloads passed through to the fetch tool
    pub concurrent_fragments: u32,
    /// HTTP chunk size in bytes passed through to the fetch tool
    pub http_chunk_size: u64,
    /// Fetch tool binary name or path
    pub ytdlp_bin: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Every variable has a default; malformed numeric values fall back.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()?;

        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("fetchr_cache"));

        // Comma-separated peer base URLs, e.g. "https://a.example.com,https://b.example.com"
        let backends: Vec<String> = env::var("BACKENDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();

        let dispatch_strategy = match env::var("DISPATCH_STRATEGY")
            .unwrap_or_else(|_| "roundrobin".to_string())
            .to_lowercase()
            .as_str()
        {
            "random" => DispatchStrategy::Random,
            _ => DispatchStrategy::RoundRobin,
        };

        let file_ttl_secs: u64 = env::var("FILE_TTL_SECONDS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);

        let sweep_interval_secs: u64 = env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let forward_timeout_secs: u64 = env::var("FORWARD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let concurrent_fragments: u32 = env::var("CONCURRENT_FRAGMENTS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let http_chunk_size: u64 = env::var("HTTP_CHUNK_SIZE")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10_485_760);

        let ytdlp_bin = env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());

        Ok(Config {
            port,
            cache_dir,
            backends,
            dispatch_strategy,
            file_ttl_secs,
            sweep_interval_secs,
            forward_timeout_secs,
            concurrent_fragments,
            http_chunk_size,
            ytdlp_bin,
        })
    }

    /// File TTL as a [`Duration`]
    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_secs)
    }

    /// Sweep interval as a [`Duration`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Forwarding timeout as a [`Duration`]
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Set env vars, run `f`, then restore original state.
    ///
    /// `set` — vars to set; `unset` — vars to remove before running `f`.
    fn with_env(set: &[(&str, &str)], unset: &[&str], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        // Save state for all touched vars
        let save_set: Vec<(&str, Option<String>)> = set
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();
        let save_unset: Vec<(&str, Option<String>)> =
            unset.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for (k, v) in set {
            // SAFETY: serialized by ENV_LOCK — no other thread modifies env vars concurrently.
            unsafe { std::env::set_var(k, v) };
        }
        for k in unset {
            unsafe { std::env::remove_var(k) };
        }

        f();

        // Restore
        for (k, old) in save_set.into_iter().chain(save_unset) {
            match old {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    const ALL_VARS: &[&str] = &[
        "PORT",
        "CACHE_DIR",
        "BACKENDS",
        "DISPATCH_STRATEGY",
        "FILE_TTL_SECONDS",
        "SWEEP_INTERVAL_SECS",
        "FORWARD_TIMEOUT_SECS",
        "CONCURRENT_FRAGMENTS",
        "HTTP_CHUNK_SIZE",
        "YTDLP_BIN",
    ];

    #[test]
    fn defaults_without_env() {
        with_env(&[], ALL_VARS, || {
            let config = Config::from_env().expect("defaults should load");
            assert_eq!(config.port, 5000);
            assert!(config.backends.is_empty());
            assert_eq!(config.dispatch_strategy, DispatchStrategy::RoundRobin);
            assert_eq!(config.file_ttl_secs, 600);
            assert_eq!(config.sweep_interval_secs, 30);
            assert_eq!(config.forward_timeout_secs, 300);
            assert_eq!(config.concurrent_fragments, 10);
            assert_eq!(config.http_chunk_size, 10_485_760);
            assert_eq!(config.ytdlp_bin, "yt-dlp");
            assert!(config.cache_dir.ends_with("fetchr_cache"));
        });
    }

    #[test]
    fn backends_parsed_and_trimmed() {
        with_env(
            &[(
                "BACKENDS",
                " https://a.example.com , https://b.example.com ,, ",
            )],
            &["DISPATCH_STRATEGY"],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(
                    config.backends,
                    vec![
                        "https://a.example.com".to_string(),
                        "https://b.example.com".to_string()
                    ]
                );
            },
        );
    }

    #[test]
    fn empty_backends_means_local_mode() {
        with_env(&[("BACKENDS", "")], &[], || {
            let config = Config::from_env().unwrap();
            assert!(config.backends.is_empty());
        });
    }

    #[test]
    fn strategy_random() {
        with_env(&[("DISPATCH_STRATEGY", "random")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.dispatch_strategy, DispatchStrategy::Random);
        });
    }

    #[test]
    fn strategy_defaults_to_round_robin_for_unknown() {
        with_env(&[("DISPATCH_STRATEGY", "weighted")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.dispatch_strategy, DispatchStrategy::RoundRobin);
        });
    }

    #[test]
    fn file_ttl_parsed() {
        with_env(&[("FILE_TTL_SECONDS", "120")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.file_ttl_secs, 120);
            assert_eq!(config.file_ttl(), Duration::from_secs(120));
        });
    }

    #[test]
    fn malformed_ttl_falls_back_to_default() {
        with_env(&[("FILE_TTL_SECONDS", "ten minutes")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.file_ttl_secs, 600);
        });
    }

    #[test]
    fn cache_dir_from_env() {
        with_env(&[("CACHE_DIR", "/var/cache/fetchr")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.cache_dir, PathBuf::from("/var/cache/fetchr"));
        });
    }

    #[test]
    fn malformed_port_is_an_error() {
        with_env(&[("PORT", "not-a-port")], &[], || {
            assert!(Config::from_env().is_err());
        });
    }
}
