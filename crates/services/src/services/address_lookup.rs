//! Geolocation fix -> reverse geocode -> province/district, exposed as an
//! observable lookup state.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use ts_rs::TS;

use super::{
    address_resolver::AddressResolver,
    geocoding::{Coordinates, GeocodeError, ReverseGeocoder},
    location_directory::LocationDirectory,
    province::Province,
};

pub const MSG_GEOLOCATION_UNSUPPORTED: &str = "Trình duyệt của bạn không hỗ trợ định vị";
pub const MSG_PERMISSION_DENIED: &str = "Bạn đã từ chối quyền truy cập vị trí";
pub const MSG_POSITION_UNAVAILABLE: &str = "Không thể xác định vị trí hiện tại";
pub const MSG_TIMEOUT: &str = "Hết thời gian chờ xác định vị trí";
pub const MSG_GEOLOCATION_UNKNOWN: &str = "Đã xảy ra lỗi khi lấy vị trí";
pub const MSG_REVERSE_GEOCODE_FAILED: &str = "Không thể lấy địa chỉ từ vị trí hiện tại";

/// Platform geolocation failure, mirroring the W3C `GeolocationPositionError` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("geolocation is not supported")]
    Unsupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out")]
    Timeout,
    #[error("unknown geolocation error")]
    Unknown,
}

impl GeolocationError {
    /// Map a platform error code (`1` denied, `2` unavailable, `3` timeout).
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unknown,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unsupported => MSG_GEOLOCATION_UNSUPPORTED,
            Self::PermissionDenied => MSG_PERMISSION_DENIED,
            Self::PositionUnavailable => MSG_POSITION_UNAVAILABLE,
            Self::Timeout => MSG_TIMEOUT,
            Self::Unknown => MSG_GEOLOCATION_UNKNOWN,
        }
    }
}

/// Anything that stops a lookup from producing an address.
#[derive(Debug, Error)]
pub enum AddressLookupError {
    #[error("geolocation failed: {0}")]
    Geolocation(#[from] GeolocationError),
    #[error("reverse geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
}

impl AddressLookupError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Geolocation(e) => e.user_message(),
            Self::Geocode(_) => MSG_REVERSE_GEOCODE_FAILED,
        }
    }
}

/// Source of the current position fix.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// A position fix (or failure code) reported by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct PositionReport {
    pub coordinates: Option<Coordinates>,
    pub error_code: Option<u16>,
}

#[async_trait]
impl GeolocationProvider for PositionReport {
    /// A report with neither coordinates nor an error code means the client
    /// has no geolocation capability.
    fn is_supported(&self) -> bool {
        self.coordinates.is_some() || self.error_code.is_some()
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        match (self.coordinates, self.error_code) {
            (Some(coordinates), _) => Ok(coordinates),
            (None, Some(code)) => Err(GeolocationError::from_code(code)),
            (None, None) => Err(GeolocationError::Unsupported),
        }
    }
}

/// Observable result of the latest lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
pub struct AddressLookupState {
    pub address: Option<String>,
    #[ts(type = "string | null")]
    pub province: Option<Province>,
    pub district: Option<String>,
    pub error: Option<String>,
    pub is_loading: bool,
}

/// Turns a position fix into an address, province and district. Runs once on
/// first use and again on each [`refetch`](Self::refetch); subscribers see
/// every state change.
pub struct AddressLookup {
    position: Arc<dyn GeolocationProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    directory: Arc<LocationDirectory>,
    resolver: AddressResolver,
    state: watch::Sender<AddressLookupState>,
    started: AtomicBool,
}

impl AddressLookup {
    pub fn new(
        position: Arc<dyn GeolocationProvider>,
        geocoder: Arc<dyn ReverseGeocoder>,
        directory: Arc<LocationDirectory>,
        resolver: AddressResolver,
    ) -> Self {
        let (state, _) = watch::channel(AddressLookupState::default());
        Self {
            position,
            geocoder,
            directory,
            resolver,
            state,
            started: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AddressLookupState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AddressLookupState {
        self.state.borrow().clone()
    }

    /// Runs the lookup the first time it is called; later calls return the
    /// latest state without touching the network.
    pub async fn current(&self) -> AddressLookupState {
        if self.started.swap(true, Ordering::SeqCst) {
            return self.state();
        }
        self.refetch().await
    }

    /// Run the lookup again.
    pub async fn refetch(&self) -> AddressLookupState {
        self.started.store(true, Ordering::SeqCst);

        if !self.position.is_supported() {
            self.state.send_modify(|state| {
                state.error = Some(GeolocationError::Unsupported.user_message().to_string());
                state.is_loading = false;
            });
            return self.state();
        }

        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        match self.lookup().await {
            Ok((address, province, district)) => {
                info!(
                    province = ?province,
                    district = ?district,
                    "Resolved current address"
                );
                self.state.send_modify(|state| {
                    state.address = Some(address);
                    state.province = province;
                    state.district = district;
                    state.error = None;
                    state.is_loading = false;
                });
            }
            Err(e) => {
                warn!(error = %e, "Address lookup failed");
                self.state.send_modify(|state| {
                    state.error = Some(e.user_message().to_string());
                    state.is_loading = false;
                });
            }
        }

        self.state()
    }

    async fn lookup(
        &self,
    ) -> Result<(String, Option<Province>, Option<String>), AddressLookupError> {
        let coordinates = self.position.current_position().await?;
        let address = self.geocoder.reverse(coordinates).await?;
        let directory = self.directory.current_or_load().await;
        let resolved = self.resolver.resolve(&address, &directory);

        Ok((resolved.address, resolved.province, resolved.district))
    }
}
