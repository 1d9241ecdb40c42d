//! Rental API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Rental, RentalQuery, ReturnReceipt, ReturnRentalRequest, StartRentalRequest};
use crate::AppState;

/// GET /api/rentals - List rentals, optionally filtered by user and status.
pub async fn list_rentals(
    State(state): State<AppState>,
    Query(query): Query<RentalQuery>,
) -> ApiResult<Vec<Rental>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_rentals(&query).await {
        Ok(rentals) => success(rentals, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/rentals/{id} - Get a single rental.
pub async fn get_rental(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Rental> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_rental(&id).await {
        Ok(Some(rental)) => success(rental, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Rental {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/rentals - Rent a bike from a station slot.
pub async fn start_rental(
    State(state): State<AppState>,
    Json(request): Json<StartRentalRequest>,
) -> ApiResult<Rental> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.user_id.trim().is_empty() {
        return error(
            AppError::Validation("userId is required".to_string()),
            revision_id,
        );
    }
    if request.station.trim().is_empty() {
        return error(
            AppError::Validation("station is required".to_string()),
            revision_id,
        );
    }

    match state.repo.start_rental(&request, Utc::now()).await {
        Ok(rental) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(rental, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/rentals/{id}/return - Return the bike into a slot.
pub async fn return_rental(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReturnRentalRequest>,
) -> ApiResult<ReturnReceipt> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .repo
        .return_rental(
            &id,
            &request,
            state.config.fallback_hourly_rate,
            Utc::now(),
        )
        .await
    {
        Ok(receipt) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(receipt, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
