// Quantum Trust Dashboard - Web Server
// REST API + live feed WebSocket with Axum

use anyhow::{Context, Result};
use clap::Parser;
use quantum_trust::api::{router, AppState};
use quantum_trust::{ConfigArgs, DashboardConfig, Storage};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Quantum Trust API server
#[derive(Parser, Debug)]
#[command(name = "quantum-server", version, about)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantum_server=info,quantum_trust=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DashboardConfig::from(Args::parse().config);
    tracing::info!(version = quantum_trust::VERSION, "starting quantum trust server");

    // Missing database degrades to a disconnected storage
    let storage = Storage::open(config.database_path.as_deref())
        .context("Failed to open database")?;
    if !storage.is_connected() {
        tracing::warn!("running without a database: CRUD routes answer 503");
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(storage, config);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("server running on http://{}", addr);
    tracing::info!("   API:  http://{}/api/quantum/coherence", addr);
    tracing::info!("   Feed: ws://{}/ws/feed", addr);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
