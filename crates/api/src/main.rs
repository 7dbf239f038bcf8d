use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synthpop_api::config::ServerConfig;
use synthpop_api::notifications::NotificationRouter;
use synthpop_api::router::build_app_router;
use synthpop_api::state::AppState;
use synthpop_core::{RandomSimulator, Simulator};
use synthpop_engine::{EngineConfig, Orchestrator};
use synthpop_events::EventBus;
use synthpop_store::JobStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synthpop_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let engine_config = EngineConfig::from_env();
    tracing::info!(
        max_attempts = engine_config.max_attempts,
        ready_probability = engine_config.ready_probability,
        "Loaded engine configuration"
    );

    // --- Job store ---
    let store = Arc::new(JobStore::new());

    // --- Fulfillment simulator ---
    let simulator: Arc<dyn Simulator> = Arc::new(
        RandomSimulator::new()
            .with_ready_probability(engine_config.ready_probability)
            .with_time_scale(engine_config.time_scale),
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Orchestrator ---
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        simulator,
        Arc::clone(&event_bus),
        engine_config,
    ));

    // Spawn the notification router (delivers job completion notices).
    let notification_cancel = CancellationToken::new();
    let notification_handle = tokio::spawn(
        NotificationRouter::from_env().run(event_bus.subscribe(), notification_cancel.clone()),
    );
    tracing::info!("Notification router started");

    // --- App state ---
    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        store,
        config: Arc::new(config.clone()),
        event_bus,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Drain background work ---
    tracing::info!("Shutting down; draining fulfillment tasks");
    notification_cancel.cancel();

    let drain = async {
        orchestrator.shutdown().await;
        let _ = notification_handle.await;
    };
    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), drain)
        .await
        .is_err()
    {
        tracing::warn!("Shutdown timeout elapsed with background tasks still running");
    }

    tracing::info!("Shutdown complete");
}

/// Resolve when the process receives Ctrl+C.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Received Ctrl+C");
}
