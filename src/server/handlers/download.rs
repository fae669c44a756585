use crate::dispatch;
use crate::error::Result;
use crate::fetcher::{self, Quality};
use crate::metrics;
use crate::server::state::AppState;
use crate::server::url_validation::validate_media_url;
use axum::Json;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Inbound download request form
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
}

/// Success payload: retrieval path plus display filename.
///
/// Peers return the same shape; a forwarded response is relayed as-is.
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub file: String,
    pub filename: String,
}

/// Handle a download request: fetch locally when no backends are
/// configured, otherwise fail over across the peer pool.
pub async fn download(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> Result<Response> {
    let start = Instant::now();

    let url = form.url.trim();
    // Rejected before any fetch or dispatch work
    if let Err(e) = validate_media_url(url) {
        metrics::record_request("download", 400);
        return Err(e);
    }
    let quality = Quality::resolve(form.quality.as_deref());

    if state.pool.is_empty() {
        local_download(&state, url, quality, start).await
    } else {
        forward_download(&state, url, quality, start).await
    }
}

/// Local mode: fetch through the adapter, no retry on failure
async fn local_download(
    state: &AppState,
    url: &str,
    quality: Quality,
    start: Instant,
) -> Result<Response> {
    match fetcher::fetch_to_cache(state.fetcher.as_ref(), &state.cache, url, quality).await {
        Ok(outcome) => {
            let filename = outcome.file.key.filename();
            info!(
                filename,
                cache_hit = outcome.cache_hit,
                size_bytes = outcome.file.size_bytes,
                "download ready"
            );

            metrics::record_request("download", 200);
            metrics::record_duration("download", start);

            Ok(Json(DownloadResponse {
                file: format!("/file/{filename}"),
                filename,
            })
            .into_response())
        }
        Err(e) => {
            metrics::record_request("download", 500);
            metrics::record_duration("download", start);
            Err(e)
        }
    }
}

/// Forwarding mode: bounded failover scan, first success relayed verbatim
async fn forward_download(
    state: &AppState,
    url: &str,
    quality: Quality,
    start: Instant,
) -> Result<Response> {
    match dispatch::forward(
        &state.http_client,
        &state.pool,
        url,
        quality,
        state.config.forward_timeout(),
    )
    .await
    {
        Ok(payload) => {
            metrics::record_request("download", 200);
            metrics::record_duration("download", start);
            Ok(Json(payload).into_response())
        }
        Err(e) => {
            metrics::record_request("download", 502);
            metrics::record_duration("download", start);
            Err(e)
        }
    }
}
