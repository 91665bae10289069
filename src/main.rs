//! Gateway entry point: load configuration, build the immutable routing
//! snapshot from onboarding descriptors, connect the user-directory pool,
//! construct the single shared outbound client, and serve until a shutdown
//! signal arrives.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use edge_gateway::auth::credentials::Sha256Verifier;
use edge_gateway::core::error::GatewayError;
use edge_gateway::data::directory::PgUserDirectory;
use edge_gateway::gateway::server::{build_router, AppState};
use edge_gateway::observability::logging::init_logging;
use edge_gateway::onboarding::registry::build_registries;
use edge_gateway::{GatewayConfig, GatewayResult};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let config_path = std::env::var("GATEWAY_CONFIG_PATH")
        .unwrap_or_else(|_| "config/gateway.yaml".to_string());
    let config = GatewayConfig::load_from_file(&config_path).await?;

    init_logging(&config.logging);
    info!("🚀 Starting edge gateway v{}", env!("CARGO_PKG_VERSION"));

    match startup(&config).await {
        Ok(()) => {
            info!("Gateway shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Failed to start gateway: {e}");
            std::process::exit(1);
        }
    }
}

async fn startup(config: &GatewayConfig) -> GatewayResult<()> {
    // Routing table and documentation registry: built once, immutable,
    // injected everywhere.
    let (routing, docs) = build_registries(Path::new(&config.onboarding.descriptor_dir));
    info!(
        services = routing.len(),
        documented = docs.len(),
        "Onboarding complete"
    );

    let directory = Arc::new(PgUserDirectory::connect(&config.database).await?);
    info!("User directory pool connected");

    // The one shared outbound client, constructed during wiring rather
    // than lazily on first use.
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| GatewayError::internal(format!("Failed to build HTTP client: {e}")))?;

    let state = AppState::new(
        config,
        routing,
        docs,
        client,
        directory,
        Arc::new(Sha256Verifier),
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Gateway listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
