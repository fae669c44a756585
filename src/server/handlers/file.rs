use crate::error::Result;
use crate::metrics;
use crate::server::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use tokio_util::io::ReaderStream;
use tracing::info;

/// Serve a cached file as an attachment.
///
/// Misses cover both "never created" and "evicted after creation" — the
/// evictor may remove a file between a caller's download response and its
/// retrieval request, and that is an ordinary 404, not a server error.
pub async fn serve_file(
    Path(filename): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let (file, length) = match state.cache.open(&filename).await {
        Ok(opened) => opened,
        Err(e) => {
            metrics::record_request("file", 404);
            return Err(e);
        }
    };

    info!(filename, length, "serving cached file");

    metrics::record_request("file", 200);
    metrics::record_duration("file", start);

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
