//! Peer dispatch: backend pool, selection strategy, and failover forwarding.
//!
//! A request arriving at an instance with configured backends is forwarded
//! instead of fetched locally. The pool produces candidates per the
//! configured strategy; the failover loop tries each distinct peer at most
//! once and relays the first well-formed success verbatim. No liveness
//! state is kept across requests — a dead peer is retried fresh next time.

use crate::config::{Config, DispatchStrategy};
use crate::error::{FetchrError, Result};
use crate::fetcher::Quality;
use crate::metrics;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// A peer instance of this service, identified by its base URL.
///
/// No liveness state — failures are discovered at call time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Backend {
    address: String,
}

impl Backend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Join a service path onto the base address
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Shared backend pool with its selection strategy.
///
/// The round-robin cursor is the only shared mutable state in the dispatch
/// path; read-and-increment happens under the mutex so concurrent callers
/// always compute the index from one consistently-read cursor value.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Backend>,
    strategy: DispatchStrategy,
    cursor: Mutex<u64>,
}

impl BackendPool {
    pub fn new(addresses: impl IntoIterator<Item = String>, strategy: DispatchStrategy) -> Self {
        Self {
            backends: addresses.into_iter().map(Backend::new).collect(),
            strategy,
            cursor: Mutex::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backends.iter().cloned(), config.dispatch_strategy)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Produce the next candidate, or `None` when no peers are configured.
    ///
    /// Round-robin guarantees that N consecutive calls visit all N peers
    /// exactly once; random may repeat.
    pub fn next(&self) -> Option<&Backend> {
        if self.backends.is_empty() {
            return None;
        }
        match self.strategy {
            DispatchStrategy::Random => self.backends.choose(&mut rand::thread_rng()),
            DispatchStrategy::RoundRobin => {
                let mut cursor = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
                let index = (*cursor % self.backends.len() as u64) as usize;
                *cursor = cursor.wrapping_add(1);
                Some(&self.backends[index])
            }
        }
    }
}

/// Forward a download request across the pool until one peer succeeds.
///
/// Each distinct peer is tried at most once; candidates the selector
/// re-produces (random repeats, round-robin wrap) are skipped without
/// consuming an attempt. A 2xx response with a well-formed JSON body is
/// relayed verbatim; network errors, non-success statuses, and malformed
/// bodies all advance to the next candidate. Exhausting every distinct peer
/// yields [`FetchrError::AllBackendsFailed`].
pub async fn forward(
    client: &Client,
    pool: &BackendPool,
    url: &str,
    quality: Quality,
    timeout: Duration,
) -> Result<Value> {
    let total = pool.len();
    let mut tried: HashSet<&Backend> = HashSet::with_capacity(total);

    while tried.len() < total {
        let Some(backend) = pool.next() else { break };
        if !tried.insert(backend) {
            // Already attempted in this sequence — ask the selector again
            continue;
        }

        info!(
            backend = backend.address(),
            attempt = tried.len(),
            total,
            "forwarding download request"
        );

        let response = client
            .post(backend.endpoint("/download"))
            .form(&[("url", url), ("quality", quality.label())])
            .timeout(timeout)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(payload) => return Ok(payload),
                    Err(e) => {
                        warn!(backend = backend.address(), error = %e, "backend returned malformed payload");
                    }
                }
            }
            Ok(response) => {
                warn!(
                    backend = backend.address(),
                    status = %response.status(),
                    "backend returned non-success status"
                );
            }
            Err(e) => {
                warn!(backend = backend.address(), error = %e, "backend unreachable");
            }
        }
        metrics::record_backend_failure();
    }

    Err(FetchrError::AllBackendsFailed(total))
}
