use crate::server::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

/// Health check endpoint, also served at `/`
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mode = if state.pool.is_empty() {
        "local"
    } else {
        "dispatch"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": mode,
        "backends": state.pool.len(),
    }))
}
