//! REST API module.
//!
//! Every handler answers with the `{ success, data, revisionId }` envelope.

mod bicycles;
mod datastore;
mod rentals;
mod search;
mod slots;
mod stations;
mod users;

pub use bicycles::*;
pub use datastore::*;
pub use rentals::*;
pub use search::*;
pub use slots::*;
pub use stations::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Rebuild the station index after a catalog change. Failures only degrade search.
async fn refresh_search(state: &crate::AppState) {
    let stations = match state.repo.list_stations().await {
        Ok(stations) => stations,
        Err(e) => {
            tracing::warn!("Failed to load stations for indexing: {}", e);
            return;
        }
    };
    if let Err(e) = state.search.rebuild(&stations).await {
        tracing::warn!("Failed to rebuild station index: {}", e);
    }
}
