use fetchr::{config, server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt::init();

    info!("🚀 Starting Fetchr - media download dispatcher");

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if config.backends.is_empty() {
        info!("No backends configured - running in local fetch mode");
    } else {
        info!(
            "Dispatching across {} backend(s) with {:?} strategy",
            config.backends.len(),
            config.dispatch_strategy
        );
    }

    if let Err(e) = server::start(config).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
