//! Route definitions, one module per resource.

pub mod datasets;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/datasets", datasets::router())
}
