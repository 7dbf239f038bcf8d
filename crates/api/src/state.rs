use std::sync::Arc;

use synthpop_engine::Orchestrator;
use synthpop_events::EventBus;
use synthpop_store::JobStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The deduplicating job orchestrator (write path).
    pub orchestrator: Arc<Orchestrator>,
    /// The job store (read path for status lookups and health).
    pub store: Arc<JobStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for job lifecycle events.
    pub event_bus: Arc<EventBus>,
}
