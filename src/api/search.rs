//! Station search endpoint.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::models::{stations_from_catalog, Station};
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub station: Station,
    pub score: f32,
}

const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Search stations by name or location.
pub async fn search_stations(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let limit = params.limit.min(MAX_SEARCH_LIMIT);

    let hits = match state.search.search(&params.q, limit, params.offset) {
        Ok(hits) => hits,
        Err(e) => return error(e, revision_id),
    };

    // Hits whose station left the catalog since the last rebuild are dropped
    let stations = match state.repo.list_bicycles().await {
        Ok(bicycles) => stations_from_catalog(&bicycles),
        Err(e) => return error(e, revision_id),
    };
    let results: Vec<SearchResultItem> = hits
        .into_iter()
        .filter_map(|hit| {
            stations
                .iter()
                .find(|s| s.key == hit.station_key)
                .map(|station| SearchResultItem {
                    station: station.clone(),
                    score: hit.score,
                })
        })
        .collect();

    let total = results.len();

    success(
        SearchResponse {
            results,
            total,
            limit,
            offset: params.offset,
        },
        revision_id,
    )
}
