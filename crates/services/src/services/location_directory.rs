//! Province/district directory backed by the local cache, the directory API,
//! and the bundled dataset, in that order.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use db::models::local_storage::LocalStorageItem;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::{
    directory_api::{
        DirectoryApi, DirectoryError, DistrictRecord, ProvinceRecord, RetryPolicy,
        fetch_with_retry,
    },
    request_queue::RequestQueue,
    static_locations::{self, StaticDirectory},
};

pub const CACHE_KEY: &str = "vietnamese_locations_data";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Serialized form stored under [`CACHE_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDirectory {
    pub provinces: Vec<String>,
    pub districts: HashMap<String, Vec<String>>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Where a [`Directory`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum DirectorySource {
    Cache,
    Network,
    Fallback,
}

/// Province names plus their sorted district lists.
#[derive(Debug, Clone)]
pub struct Directory {
    provinces: Vec<String>,
    districts: HashMap<String, Arc<[String]>>,
    timestamp: i64,
    source: DirectorySource,
}

impl Directory {
    pub fn new(
        provinces: Vec<String>,
        districts: HashMap<String, Vec<String>>,
        timestamp: i64,
        source: DirectorySource,
    ) -> Self {
        Self {
            provinces,
            districts: districts
                .into_iter()
                .map(|(province, list)| (province, Arc::from(list)))
                .collect(),
            timestamp,
            source,
        }
    }

    /// Build from raw API records. Districts are grouped by parent province
    /// and each group is sorted.
    pub fn from_records(
        provinces: Vec<ProvinceRecord>,
        districts: Vec<DistrictRecord>,
        timestamp: i64,
    ) -> Self {
        let province_names = provinces.into_iter().map(|p| p.name_with_type).collect();

        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for record in districts {
            let Some(province) = record.province_name() else {
                debug!(district = %record.name_with_type, "District without a parent province, skipping");
                continue;
            };
            grouped
                .entry(province.to_string())
                .or_default()
                .push(record.name_with_type);
        }
        for list in grouped.values_mut() {
            list.sort();
        }

        Self::new(province_names, grouped, timestamp, DirectorySource::Network)
    }

    fn from_static(dataset: &StaticDirectory, timestamp: i64) -> Self {
        Self::new(
            dataset.provinces.clone(),
            dataset.districts.clone(),
            timestamp,
            DirectorySource::Fallback,
        )
    }

    fn from_cached(entry: CachedDirectory) -> Self {
        Self::new(
            entry.provinces,
            entry.districts,
            entry.timestamp,
            DirectorySource::Cache,
        )
    }

    pub fn to_cached(&self) -> CachedDirectory {
        CachedDirectory {
            provinces: self.provinces.clone(),
            districts: self
                .districts
                .iter()
                .map(|(province, list)| (province.clone(), list.to_vec()))
                .collect(),
            timestamp: self.timestamp,
        }
    }

    pub fn provinces(&self) -> &[String] {
        &self.provinces
    }

    /// Districts of `province`, empty when it is unknown. Repeated calls on
    /// the same directory return the same allocation.
    pub fn get_districts(&self, province: &str) -> Arc<[String]> {
        self.districts
            .get(province)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source(&self) -> DirectorySource {
        self.source
    }

    pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) > ttl_ms
    }
}

/// Supplies the directory to consumers. Owns the queue that throttles calls
/// to the directory API.
pub struct LocationDirectory {
    pool: SqlitePool,
    api: Arc<dyn DirectoryApi>,
    queue: RequestQueue,
    retry: RetryPolicy,
    cache_ttl: Duration,
    current: RwLock<Option<Arc<Directory>>>,
    /// Held while the first load runs so concurrent callers share its result.
    first_load: Mutex<()>,
}

impl LocationDirectory {
    pub fn new(pool: SqlitePool, api: Arc<dyn DirectoryApi>, queue: RequestQueue) -> Self {
        Self {
            pool,
            api,
            queue,
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            current: RwLock::new(None),
            first_load: Mutex::new(()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Resolve the directory: fresh cache entry, else the API, else the
    /// bundled dataset. Never fails.
    pub async fn load(&self) -> Arc<Directory> {
        let now = Utc::now().timestamp_millis();

        match self.read_cache().await {
            Ok(Some(cached)) if !cached.is_expired(now, self.cache_ttl) => {
                debug!(
                    age_ms = now - cached.timestamp(),
                    "Using cached location directory"
                );
                return self.publish(cached).await;
            }
            Ok(Some(cached)) => {
                info!(
                    age_ms = now - cached.timestamp(),
                    "Cached location directory expired, refetching"
                );
            }
            Ok(None) => debug!("No cached location directory"),
            Err(e) => {
                warn!(error = %e, "Could not read cached location directory, using bundled data");
                return self.fallback().await;
            }
        }

        self.refetch().await
    }

    /// Fetch from the API regardless of the cache, falling back to the
    /// bundled dataset on failure.
    pub async fn refetch(&self) -> Arc<Directory> {
        match self.fetch_from_network().await {
            Ok(directory) => {
                info!(
                    provinces = directory.provinces().len(),
                    "Fetched location directory"
                );
                self.write_cache(&directory).await;
                self.publish(directory).await
            }
            Err(e) => {
                warn!(error = %e, "Location directory fetch failed, using bundled data");
                self.fallback().await
            }
        }
    }

    /// Last directory produced by [`load`](Self::load) or [`refetch`](Self::refetch).
    pub async fn current(&self) -> Option<Arc<Directory>> {
        self.current.read().await.clone()
    }

    /// The published directory, loading it first if nothing has been
    /// published yet. Callers arriving during that first load wait for it
    /// instead of starting their own.
    pub async fn current_or_load(&self) -> Arc<Directory> {
        if let Some(directory) = self.current().await {
            return directory;
        }

        let _guard = self.first_load.lock().await;
        if let Some(directory) = self.current().await {
            return directory;
        }
        self.load().await
    }

    /// [`current_or_load`](Self::current_or_load) in the background. If every
    /// receiver has been dropped by the time loading finishes, the result is
    /// discarded.
    pub fn spawn_load(self: &Arc<Self>) -> watch::Receiver<Option<Arc<Directory>>> {
        let (tx, rx) = watch::channel(None);
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let directory = this.current_or_load().await;
            if tx.is_closed() {
                debug!("Location directory loaded after all subscribers went away");
                return;
            }
            let _ = tx.send(Some(directory));
        });

        rx
    }

    async fn fetch_from_network(&self) -> Result<Directory, DirectoryError> {
        let retry = self.retry;

        let api = Arc::clone(&self.api);
        let provinces = self
            .queue
            .add(move || async move {
                fetch_with_retry("provinces", retry, || api.provinces()).await
            })
            .await?;

        let api = Arc::clone(&self.api);
        let districts = self
            .queue
            .add(move || async move {
                fetch_with_retry("districts", retry, || api.districts()).await
            })
            .await?;

        Ok(Directory::from_records(
            provinces,
            districts,
            Utc::now().timestamp_millis(),
        ))
    }

    async fn fallback(&self) -> Arc<Directory> {
        let directory =
            Directory::from_static(static_locations::bundled(), Utc::now().timestamp_millis());
        self.write_cache(&directory).await;
        self.publish(directory).await
    }

    async fn read_cache(&self) -> Result<Option<Directory>, CacheError> {
        let Some(raw) = LocalStorageItem::get_value(&self.pool, CACHE_KEY).await? else {
            return Ok(None);
        };
        let entry: CachedDirectory = serde_json::from_str(&raw)?;
        Ok(Some(Directory::from_cached(entry)))
    }

    async fn write_cache(&self, directory: &Directory) {
        let serialized = match serde_json::to_string(&directory.to_cached()) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "Could not serialize location directory");
                return;
            }
        };
        if let Err(e) = LocalStorageItem::set(&self.pool, CACHE_KEY, &serialized).await {
            warn!(error = %e, "Could not persist location directory");
        }
    }

    async fn publish(&self, directory: Directory) -> Arc<Directory> {
        let directory = Arc::new(directory);
        *self.current.write().await = Some(Arc::clone(&directory));
        directory
    }
}
