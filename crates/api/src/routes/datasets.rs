//! Route definitions for the `/datasets` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::datasets;
use crate::state::AppState;

/// Routes mounted at `/datasets`.
///
/// ```text
/// POST   /                -> submit_dataset
/// GET    /{fingerprint}   -> get_dataset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(datasets::submit_dataset))
        .route("/{fingerprint}", get(datasets::get_dataset))
}
