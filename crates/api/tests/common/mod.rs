use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use synthpop_api::config::ServerConfig;
use synthpop_api::router::build_app_router;
use synthpop_api::state::AppState;
use synthpop_core::{RandomSimulator, Simulator};
use synthpop_engine::{EngineConfig, Orchestrator};
use synthpop_events::EventBus;
use synthpop_store::JobStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Build the full application router with all middleware layers, backed by
/// a fresh in-memory store and a deterministically seeded simulator.
///
/// `ready_probability` selects the fast path share (`0.0` = everything is
/// deferred, `1.0` = everything resolves immediately); `time_scale`
/// compresses the simulated background run (`0.0` = completes at the next
/// scheduler tick, `1.0` = realistic multi-minute waits that outlive any
/// test).
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(ready_probability: f64, time_scale: f64) -> Router {
    let config = test_config();
    let store = Arc::new(JobStore::new());
    let simulator: Arc<dyn Simulator> = Arc::new(
        RandomSimulator::seeded(0xC0FFEE)
            .with_ready_probability(ready_probability)
            .with_time_scale(time_scale),
    );
    let event_bus = Arc::new(EventBus::default());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        simulator,
        Arc::clone(&event_bus),
        EngineConfig::default(),
    ));

    let state = AppState {
        orchestrator,
        store,
        config: Arc::new(config.clone()),
        event_bus,
    };

    build_app_router(state, &config)
}

/// Send a GET request to the router.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body to the router.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
