//! Reverse geocoding through Nominatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use url::Url;

use super::directory_api::parse_base_url;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const LANGUAGE: &str = "vi";

/// A position fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a reverse-geocoding call produced no address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// Non-2xx response from the geocoding service.
    #[error("http {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("json error: {0}")]
    Decode(String),
    /// The service answered but had no display name for the position.
    #[error("no address for these coordinates")]
    MissingAddress,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Free-text display address for `coordinates`.
    async fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Nominatim `reverse` client. Asks for Vietnamese results through both the
/// `accept-language` query parameter and the `Accept-Language` header.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    http: Client,
    base_url: Url,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        let base_url =
            parse_base_url(base_url).map_err(|e| GeocodeError::InvalidUrl(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn reverse_url(&self, coordinates: Coordinates) -> Result<Url, GeocodeError> {
        let mut url = self
            .base_url
            .join("reverse")
            .map_err(|e| GeocodeError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("lat", &coordinates.latitude.to_string())
            .append_pair("lon", &coordinates.longitude.to_string())
            .append_pair("format", "json")
            .append_pair("accept-language", LANGUAGE);
        Ok(url)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError> {
        let url = self.reverse_url(coordinates)?;
        let res = self
            .http
            .get(url)
            .header(header::ACCEPT_LANGUAGE, LANGUAGE)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Transport(e.to_string())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(GeocodeError::Http {
                status: status.as_u16(),
            });
        }

        let body = res
            .json::<ReverseResponse>()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;
        display_name(body)
    }
}

fn display_name(body: ReverseResponse) -> Result<String, GeocodeError> {
    if let Some(reason) = &body.error {
        debug!(reason = %reason, "Nominatim returned no match");
    }
    body.display_name
        .filter(|name| !name.trim().is_empty())
        .ok_or(GeocodeError::MissingAddress)
}
