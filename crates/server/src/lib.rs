use std::sync::Arc;

use axum::Router;
use db::DBService;
use services::services::{
    address_resolver::AddressResolver,
    config::LocationConfig,
    directory_api::FpoDirectoryClient,
    geocoding::{NominatimClient, ReverseGeocoder},
    location_directory::LocationDirectory,
    request_queue::RequestQueue,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod routes;

use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<LocationDirectory>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub resolver: AddressResolver,
}

impl AppState {
    /// Wire the live HTTP clients. Must be called within a Tokio runtime.
    pub fn new(db: &DBService, config: &LocationConfig) -> Result<Self, ApiError> {
        let directory_api = FpoDirectoryClient::new(
            &config.locations_api_url,
            &config.user_agent,
            config.request_timeout,
        )?;
        let geocoder = NominatimClient::new(
            &config.nominatim_url,
            &config.user_agent,
            config.request_timeout,
        )?;

        let directory = LocationDirectory::new(
            db.pool.clone(),
            Arc::new(directory_api),
            RequestQueue::new(config.queue_interval),
        )
        .with_cache_ttl(config.cache_ttl);

        Ok(Self {
            directory: Arc::new(directory),
            geocoder: Arc::new(geocoder),
            resolver: AddressResolver::new(),
        })
    }
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
