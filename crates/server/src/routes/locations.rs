use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use services::services::{
    address_lookup::{AddressLookup, AddressLookupState, PositionReport},
    location_directory::DirectorySource,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DistrictQuery {
    pub province: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct DirectorySummary {
    pub source: DirectorySource,
    /// Epoch milliseconds at which the directory was fetched.
    pub timestamp: i64,
    pub province_count: usize,
}

/// GET /api/locations/provinces
pub async fn get_provinces(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let directory = state.directory.current_or_load().await;
    Ok(ResponseJson(ApiResponse::success(
        directory.provinces().to_vec(),
    )))
}

/// GET /api/locations/districts?province=
/// Unknown provinces yield an empty list.
pub async fn get_districts(
    State(state): State<AppState>,
    Query(query): Query<DistrictQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let province = query.province.trim();
    if province.is_empty() {
        return Err(ApiError::BadRequest("province is required".to_string()));
    }

    let directory = state.directory.current_or_load().await;
    Ok(ResponseJson(ApiResponse::success(
        directory.get_districts(province).to_vec(),
    )))
}

/// POST /api/locations/lookup
/// Resolve the client's reported position. Lookup failures are reported in
/// the `error` field of the state, not as an HTTP error.
pub async fn lookup_address(
    State(state): State<AppState>,
    axum::Json(report): axum::Json<PositionReport>,
) -> Result<ResponseJson<ApiResponse<AddressLookupState>>, ApiError> {
    let lookup = AddressLookup::new(
        Arc::new(report),
        Arc::clone(&state.geocoder),
        Arc::clone(&state.directory),
        state.resolver.clone(),
    );

    Ok(ResponseJson(ApiResponse::success(lookup.current().await)))
}

/// POST /api/locations/refresh
/// Refetch the directory from the API, bypassing the cache.
pub async fn refresh_directory(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<DirectorySummary>>, ApiError> {
    let directory = state.directory.refetch().await;

    tracing::info!(source = ?directory.source(), "Location directory refreshed");

    Ok(ResponseJson(ApiResponse::success(DirectorySummary {
        source: directory.source(),
        timestamp: directory.timestamp(),
        province_count: directory.provinces().len(),
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/locations",
        Router::new()
            .route("/provinces", get(get_provinces))
            .route("/districts", get(get_districts))
            .route("/lookup", post(lookup_address))
            .route("/refresh", post(refresh_directory)),
    )
}
