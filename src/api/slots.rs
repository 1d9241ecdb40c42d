//! Slot API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{ResetSlotsRequest, Slot, UpdateSlotRequest};
use crate::AppState;

async fn ensure_station(state: &AppState, key: &str) -> Result<(), AppError> {
    match state.repo.get_station(key).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Station {} not found", key))),
    }
}

/// GET /api/stations/{key}/slots - Get the station's slots, creating them on first access.
pub async fn get_slots(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Vec<Slot>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = ensure_station(&state, &key).await {
        return error(e, revision_id);
    }

    match state.repo.get_or_create_slots(&key).await {
        Ok(slots) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(slots, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/stations/{key}/slots/{slot_id} - Set a slot's status by hand.
pub async fn update_slot(
    State(state): State<AppState>,
    Path((key, slot_id)): Path<(String, String)>,
    Json(request): Json<UpdateSlotRequest>,
) -> ApiResult<Vec<Slot>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = ensure_station(&state, &key).await {
        return error(e, revision_id);
    }

    match state
        .repo
        .set_slot_status(&key, &slot_id, request.status, request.notes.trim())
        .await
    {
        Ok(slots) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(slots, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/stations/{key}/slots/reset - Regenerate the default slot layout.
pub async fn reset_slots(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(request): Query<ResetSlotsRequest>,
) -> ApiResult<Vec<Slot>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = ensure_station(&state, &key).await {
        return error(e, revision_id);
    }

    match state.repo.reset_slots(&key, request.count).await {
        Ok(slots) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(slots, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
