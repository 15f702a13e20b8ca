//! Gridplan Server - route, coverage and exploration planning over HTTP

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridplan_server::api;
use gridplan_server::config::Config;
use gridplan_server::loops;
use gridplan_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridplan_server=debug".parse()?)
                .add_directive("gridplan_core=info".parse()?),
        )
        .init();

    tracing::info!("Starting Gridplan Server...");

    let config = Config::from_env();
    let port = config.server_port;
    tracing::info!(
        max_sessions = config.max_sessions,
        buffer_radius = ?config.route_rules.buffer_radius,
        "Loaded configuration"
    );
    let state = Arc::new(AppState::new(config));
    tokio::spawn(loops::session_sweeper::run_session_sweeper(state.clone()));

    let app = api::routes()
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, stopping exploration loops");
    state.trigger_shutdown();
}
