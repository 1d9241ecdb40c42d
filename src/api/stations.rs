//! Station API endpoints.

use axum::extract::{Path, State};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::Station;
use crate::AppState;

/// GET /api/stations - List stations derived from the catalog.
pub async fn list_stations(State(state): State<AppState>) -> ApiResult<Vec<Station>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_stations().await {
        Ok(stations) => success(stations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/stations/{key} - Get a single station.
pub async fn get_station(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Station> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_station(&key).await {
        Ok(Some(station)) => success(station, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Station {} not found", key)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
