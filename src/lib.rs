//! Fetchr — media download dispatcher.
//!
//! Accepts download requests over HTTP and either fetches the media locally
//! through an external fetch tool into a TTL-swept file cache, or fails over
//! across configured peer instances until one succeeds.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod evictor;
pub mod fetcher;
pub mod metrics;
pub mod server;
