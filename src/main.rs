use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use atom_engine::{
    create_engine_router, create_registry_router, AtomConfig, EngineApiState, EngineManager,
    InMemoryDirectory, RegistryApiState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates the authority identity
    let config = AtomConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check environment variables (ATOM_AUTHORITY is required).");
        e
    })?;

    init_logging(&config)?;

    info!("Starting ATOM reputation engine server");

    let params = config.to_engine_params()?;
    info!(
        "Engine params: alpha_fast={}, alpha_slow={}, version={}",
        params.alpha_fast, params.alpha_slow, params.version
    );

    let directory = Arc::new(InMemoryDirectory::new());
    let manager = Arc::new(EngineManager::with_params(directory.clone(), params));

    let app = Router::new()
        .nest(
            "/engine",
            create_engine_router(EngineApiState {
                manager: manager.clone(),
            }),
        )
        .nest(
            "/registry",
            create_registry_router(RegistryApiState {
                directory: directory.clone(),
            }),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("ATOM engine server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Initialize logging from the configured level
fn init_logging(config: &AtomConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
