//! Handlers for the `/datasets` resource.
//!
//! Routes:
//! - `POST /datasets`                — submit a dataset request
//! - `GET  /datasets/{fingerprint}`  — look up a job without resubmitting

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use synthpop_core::{CoreError, DatasetRequest, Fingerprint};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/datasets
///
/// Submit a request for a synthetic dataset. Returns the current job
/// record for the request's fingerprint: `pending` while a background run
/// is in flight, `ready` with the result on the fast path or once
/// fulfillment completed, `failed` when fulfillment gave up. Resubmitting
/// identical parameters always returns the same job.
pub async fn submit_dataset(
    State(state): State<AppState>,
    Json(input): Json<DatasetRequest>,
) -> AppResult<impl IntoResponse> {
    let record = state.orchestrator.submit(input).await?;

    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/datasets/{fingerprint}
///
/// Look up the job for an already-computed fingerprint without creating
/// one. Returns 404 when no job exists under that fingerprint.
pub async fn get_dataset(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> AppResult<impl IntoResponse> {
    let fingerprint = Fingerprint::from_hex(fingerprint);

    let record = state
        .store
        .get(&fingerprint)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            key: fingerprint.to_string(),
        }))?;

    Ok(Json(DataResponse { data: record }))
}
