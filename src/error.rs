use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Convenience alias used by handlers and components
pub type Result<T> = std::result::Result<T, FetchrError>;

/// All error outcomes surfaced by Fetchr.
///
/// Single-backend failures during failover are not represented here — the
/// dispatcher recovers from them internally and only surfaces
/// [`FetchrError::AllBackendsFailed`] once every distinct peer was tried.
#[derive(Debug, Error)]
pub enum FetchrError {
    /// Request rejected before any fetch or dispatch work
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The external fetch tool failed or could not be spawned
    #[error("media fetch failed: {0}")]
    FetchFailed(String),

    /// The fetch tool exited cleanly but the expected output file is absent
    #[error("fetch produced no output file: {0}")]
    MissingOutput(String),

    /// Every distinct backend was tried without a successful response
    #[error("all {0} backends failed")]
    AllBackendsFailed(usize),

    /// Requested file is not in the cache (never created, or evicted)
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FetchrError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            FetchrError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FetchrError::FetchFailed(_) | FetchrError::MissingOutput(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            FetchrError::AllBackendsFailed(_) => StatusCode::BAD_GATEWAY,
            FetchrError::NotFound(_) => StatusCode::NOT_FOUND,
            FetchrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FetchrError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
