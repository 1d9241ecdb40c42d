//! Bicycle catalog endpoints. Catalog changes rebuild the station index.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, refresh_search, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Bicycle, CreateBicycleRequest};
use crate::AppState;

fn validate_bicycle(request: &CreateBicycleRequest) -> Result<(), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if request.location.trim().is_empty() {
        return Err(AppError::Validation("Location is required".to_string()));
    }
    for (field, rate) in [
        ("hourlyRate", request.hourly_rate),
        ("dailyRate", request.daily_rate),
    ] {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::Validation(format!(
                "{} must be a non-negative number",
                field
            )));
        }
    }
    Ok(())
}

/// GET /api/bicycles - List catalog records.
pub async fn list_bicycles(State(state): State<AppState>) -> ApiResult<Vec<Bicycle>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_bicycles().await {
        Ok(bicycles) => success(bicycles, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/bicycles - Add a catalog record.
pub async fn create_bicycle(
    State(state): State<AppState>,
    Json(request): Json<CreateBicycleRequest>,
) -> ApiResult<Bicycle> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = validate_bicycle(&request) {
        return error(e, revision_id);
    }

    match state.repo.create_bicycle(&request).await {
        Ok(bicycle) => {
            refresh_search(&state).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(bicycle, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/bicycles/{id} - Remove a catalog record.
pub async fn delete_bicycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_bicycle(&id).await {
        Ok(()) => {
            refresh_search(&state).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
