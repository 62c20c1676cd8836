use std::sync::Arc;

use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use today_reader::config::Config;
use today_reader::paper::PaperCache;
use today_reader::routes::{self, AppState};
use today_reader::server::{self, ConnectionLimits};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "today_reader=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("TODAY_READER_CONFIG").unwrap_or_else(|_| "today.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded configuration from {} (max {} pages per edition)",
        config_path, config.max_pages
    );

    // Create app state
    let cache = Arc::new(PaperCache::from_config(&config)?);
    let state = Arc::new(AppState { cache });

    // Build router
    let app = routes::router(state, &config.static_dir)
        .layer(TimeoutLayer::new(config.write_timeout()))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    server::serve(listener, app, ConnectionLimits::from_config(&config)).await;

    Ok(())
}
