//! Fakes shared by the service tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use db::{DBService, models::local_storage::LocalStorageItem};

use super::{
    directory_api::{DirectoryApi, DirectoryError, DistrictRecord, ProvinceRecord, RetryPolicy},
    geocoding::{Coordinates, GeocodeError, ReverseGeocoder},
    location_directory::{CACHE_KEY, CachedDirectory, LocationDirectory},
    request_queue::RequestQueue,
};

pub(crate) struct FakeDirectoryApi {
    provinces: Result<Vec<ProvinceRecord>, DirectoryError>,
    districts: Result<Vec<DistrictRecord>, DirectoryError>,
    pub calls: AtomicUsize,
}

impl FakeDirectoryApi {
    pub fn succeeding() -> Self {
        let (provinces, districts) = hcm_records();
        Self {
            provinces: Ok(provinces),
            districts: Ok(districts),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: DirectoryError) -> Self {
        Self {
            provinces: Err(error.clone()),
            districts: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectoryApi {
    async fn provinces(&self) -> Result<Vec<ProvinceRecord>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provinces.clone()
    }

    async fn districts(&self) -> Result<Vec<DistrictRecord>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.districts.clone()
    }
}

pub(crate) fn hcm_records() -> (Vec<ProvinceRecord>, Vec<DistrictRecord>) {
    let provinces = ["Thành phố Hồ Chí Minh", "Tỉnh An Giang"]
        .into_iter()
        .map(|name| ProvinceRecord {
            name_with_type: name.to_string(),
        })
        .collect();

    let districts = [
        ("Quận 3", "Quận 3, Thành phố Hồ Chí Minh"),
        ("Quận 10", "Quận 10, Thành phố Hồ Chí Minh"),
        ("Thành phố Thủ Đức", "Thành phố Thủ Đức, Thành phố Hồ Chí Minh"),
        ("Huyện An Phú", "Huyện An Phú, Tỉnh An Giang"),
        ("Quận 1", "Quận 1, Thành phố Hồ Chí Minh"),
    ]
    .into_iter()
    .map(|(name, path)| DistrictRecord {
        name_with_type: name.to_string(),
        path_with_type: path.to_string(),
    })
    .collect();

    (provinces, districts)
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        min_delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

pub(crate) fn test_directory(db: &DBService, api: Arc<dyn DirectoryApi>) -> LocationDirectory {
    LocationDirectory::new(
        db.pool.clone(),
        api,
        RequestQueue::new(Duration::from_millis(1)),
    )
    .with_retry_policy(fast_retry())
}

/// Store a Ho Chi Minh City-only directory under the cache key.
pub(crate) async fn seed_cache(db: &DBService, timestamp: i64) {
    let mut districts = vec![
        "Huyện Bình Chánh".to_string(),
        "Quận 1".to_string(),
        "Quận 10".to_string(),
        "Quận 3".to_string(),
        "Quận Bình Thạnh".to_string(),
        "Thành phố Thủ Đức".to_string(),
    ];
    districts.sort();

    let entry = CachedDirectory {
        provinces: vec!["Thành phố Hồ Chí Minh".to_string()],
        districts: HashMap::from([("Thành phố Hồ Chí Minh".to_string(), districts)]),
        timestamp,
    };
    LocalStorageItem::set(&db.pool, CACHE_KEY, &serde_json::to_string(&entry).unwrap())
        .await
        .unwrap();
}

/// Geocoder that replays a scripted sequence of answers.
pub(crate) struct ScriptedGeocoder {
    answers: Mutex<Vec<Result<String, GeocodeError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn new(answers: Vec<Result<String, GeocodeError>>) -> Self {
        Self {
            answers: Mutex::new(answers),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for ScriptedGeocoder {
    async fn reverse(&self, _coordinates: Coordinates) -> Result<String, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            return Err(GeocodeError::MissingAddress);
        }
        answers.remove(0)
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
