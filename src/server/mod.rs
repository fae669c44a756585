pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use crate::evictor;
use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusBuilder;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Build the application router for the given config.
///
/// Handler tests drive this router directly via `tower::ServiceExt::oneshot`.
pub async fn build_router(config: Config) -> Router {
    router(AppState::new(config))
}

/// Build the router around an existing state (tests inject a mock fetcher)
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/download", post(handlers::download::download))
        .route("/file/{filename}", get(handlers::file::serve_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the Axum HTTP server and the background evictor
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config);

    // The cache directory must exist before the first fetch or sweep
    state.cache.init().await?;

    // Install the Prometheus recorder; tests never reach this path, so the
    // process-global recorder is installed exactly once
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let app = router(state.clone()).route(
        "/metrics",
        get(move || std::future::ready(metrics_handle.render())),
    );

    // One perpetual eviction task for the lifetime of the process
    let cancel = CancellationToken::new();
    let evictor_task = tokio::spawn(evictor::run(
        state.cache.clone(),
        state.config.file_ttl(),
        state.config.sweep_interval(),
        cancel.clone(),
    ));

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        cancel.cancel();
        return Err(e.into());
    }

    // Listener drained — stop the evictor before exiting
    cancel.cancel();
    let _ = evictor_task.await;

    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received SIGINT");
    }
}
