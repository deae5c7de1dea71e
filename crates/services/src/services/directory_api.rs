//! Client for the public province/district directory API.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::request_queue::RequestQueueError;

pub const DEFAULT_LOCATIONS_API_URL: &str = "https://vn-public-apis.fpo.vn";

/// Failure of a directory API call, tagged by kind so the retry wrapper can
/// decide what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The API answered 429 Too Many Requests.
    #[error("rate limited")]
    RateLimited,
    #[error("http {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("json error: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Queue(#[from] RequestQueueError),
}

impl DirectoryError {
    /// Every upstream failure shares the same retry budget. Local failures do not retry.
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::Queue(_) | Self::InvalidUrl(_))
    }
}

/// One entry of `provinces/getAll`. Other fields of the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvinceRecord {
    pub name_with_type: String,
}

/// One entry of `districts/getAll`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DistrictRecord {
    pub name_with_type: String,
    pub path_with_type: String,
}

impl DistrictRecord {
    /// Parent province, taken from the second segment of `path_with_type`
    /// (`"Quận 1, Thành phố Hồ Chí Minh"`).
    pub fn province_name(&self) -> Option<&str> {
        self.path_with_type
            .split(',')
            .nth(1)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// `{ "exitcode": 1, "data": { "data": [...] } }`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    exitcode: Option<i64>,
    data: Page<T>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

/// Source of raw province and district records.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn provinces(&self) -> Result<Vec<ProvinceRecord>, DirectoryError>;

    async fn districts(&self) -> Result<Vec<DistrictRecord>, DirectoryError>;
}

/// Exponential backoff for directory calls. The default waits 1s, 2s, 4s and
/// then gives up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub factor: f32,
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            factor: 2.0,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }
}

/// Run `op` under `policy`. After the budget is spent the last error is
/// returned unchanged, so a streak of 429s surfaces as `RateLimited`.
pub async fn fetch_with_retry<T, F, Fut>(
    resource: &'static str,
    policy: RetryPolicy,
    op: F,
) -> Result<T, DirectoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    op.retry(policy.backoff())
        .when(DirectoryError::should_retry)
        .notify(|e, dur| {
            warn!(
                resource,
                error = %e,
                "Directory request failed, retrying after {:.2}s",
                dur.as_secs_f64()
            )
        })
        .await
}

/// HTTP client for the `vn-public-apis.fpo.vn` directory. Each call fetches
/// the full list (`limit=-1`) and performs no retries of its own.
#[derive(Debug, Clone)]
pub struct FpoDirectoryClient {
    http: Client,
    base_url: Url,
}

impl FpoDirectoryClient {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: parse_base_url(base_url)
                .map_err(|e| DirectoryError::InvalidUrl(e.to_string()))?,
        })
    }

    pub fn endpoint(&self, resource: &str) -> Result<Url, DirectoryError> {
        let mut url = self
            .base_url
            .join(&format!("{resource}/getAll"))
            .map_err(|e| DirectoryError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("limit", "-1");
        Ok(url)
    }

    async fn get_all<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, DirectoryError> {
        let url = self.endpoint(resource)?;
        let res = self.http.get(url).send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let envelope = res
                    .json::<Envelope<T>>()
                    .await
                    .map_err(|e| DirectoryError::Decode(e.to_string()))?;
                debug!(
                    resource,
                    exitcode = ?envelope.exitcode,
                    count = envelope.data.data.len(),
                    "Directory response received"
                );
                Ok(envelope.data.data)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(DirectoryError::RateLimited),
            s => Err(DirectoryError::Http { status: s.as_u16() }),
        }
    }
}

#[async_trait]
impl DirectoryApi for FpoDirectoryClient {
    async fn provinces(&self) -> Result<Vec<ProvinceRecord>, DirectoryError> {
        self.get_all("provinces").await
    }

    async fn districts(&self) -> Result<Vec<DistrictRecord>, DirectoryError> {
        self.get_all("districts").await
    }
}

/// Parse a configured base URL so that relative joins append to its path
/// instead of replacing the last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, url::ParseError> {
    if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{base_url}/"))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() {
        DirectoryError::Timeout
    } else {
        DirectoryError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode as ServerStatus,
        response::IntoResponse,
        routing::get,
    };
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::services::{
        request_queue::RequestQueue,
        test_support::{fast_retry, serve},
    };

    /// Local stand-in for the directory API. `/limited` always answers 429
    /// and counts hits, `/broken` answers 500, `/ok` serves two provinces.
    async fn directory_server(limited_hits: Arc<AtomicUsize>) -> String {
        let router = Router::new()
            .route(
                "/limited/provinces/getAll",
                get(move || async move {
                    limited_hits.fetch_add(1, Ordering::SeqCst);
                    ServerStatus::TOO_MANY_REQUESTS
                }),
            )
            .route(
                "/broken/districts/getAll",
                get(|| async { ServerStatus::INTERNAL_SERVER_ERROR }),
            )
            .route(
                "/ok/provinces/getAll",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    if params.get("limit").map(String::as_str) != Some("-1") {
                        return ServerStatus::BAD_REQUEST.into_response();
                    }
                    Json(json!({
                        "exitcode": 1,
                        "data": {
                            "nItems": 2,
                            "data": [
                                { "name_with_type": "Thành phố Hồ Chí Minh", "code": "79" },
                                { "name_with_type": "Tỉnh An Giang", "code": "89" }
                            ]
                        }
                    }))
                    .into_response()
                }),
            );
        serve(router).await
    }

    fn client(base: &str, path: &str) -> FpoDirectoryClient {
        FpoDirectoryClient::new(&format!("{base}/{path}"), "test-agent", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_district_province_name() {
        let record = DistrictRecord {
            name_with_type: "Quận 1".to_string(),
            path_with_type: "Quận 1, Thành phố Hồ Chí Minh".to_string(),
        };
        assert_eq!(record.province_name(), Some("Thành phố Hồ Chí Minh"));

        let orphan = DistrictRecord {
            name_with_type: "Quận 1".to_string(),
            path_with_type: "Quận 1".to_string(),
        };
        assert_eq!(orphan.province_name(), None);
    }

    #[test]
    fn test_endpoint() {
        let client = FpoDirectoryClient::new(
            DEFAULT_LOCATIONS_API_URL,
            "test-agent",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("provinces").unwrap().as_str(),
            "https://vn-public-apis.fpo.vn/provinces/getAll?limit=-1"
        );

        let nested =
            FpoDirectoryClient::new("http://localhost:9000/api", "test-agent", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            nested.endpoint("districts").unwrap().as_str(),
            "http://localhost:9000/api/districts/getAll?limit=-1"
        );
    }

    #[test]
    fn test_envelope_decoding() {
        let body = r#"{
            "exitcode": 1,
            "data": {
                "nItems": 2,
                "data": [
                    { "name_with_type": "Quận 1", "path_with_type": "Quận 1, Thành phố Hồ Chí Minh", "code": "760" },
                    { "name_with_type": "Huyện An Phú", "path_with_type": "Huyện An Phú, Tỉnh An Giang" }
                ]
            }
        }"#;
        let envelope: Envelope<DistrictRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.exitcode, Some(1));
        assert_eq!(envelope.data.data.len(), 2);
        assert_eq!(envelope.data.data[1].province_name(), Some("Tỉnh An Giang"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backoff_then_gives_up() {
        let attempts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let result: Result<(), _> = fetch_with_retry("provinces", RetryPolicy::default(), || {
            let attempts = attempts.clone();
            async move {
                attempts.lock().unwrap().push(Instant::now());
                Err(DirectoryError::RateLimited)
            }
        })
        .await;

        assert_eq!(result, Err(DirectoryError::RateLimited));

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 4);
        let gaps: Vec<u128> = attempts
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![1000, 2000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(Mutex::new(0u32));

        let result = fetch_with_retry("districts", RetryPolicy::default(), || {
            let calls = calls.clone();
            async move {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                match *calls {
                    1 => Err(DirectoryError::Http { status: 503 }),
                    2 => Err(DirectoryError::RateLimited),
                    _ => Ok(42),
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_errors_are_not_retried() {
        let calls = Arc::new(Mutex::new(0u32));

        let result: Result<(), _> = fetch_with_retry("provinces", RetryPolicy::default(), || {
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                Err(DirectoryError::Queue(RequestQueueError::Closed))
            }
        })
        .await;

        assert_eq!(result, Err(DirectoryError::Queue(RequestQueueError::Closed)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_maps_response_status() {
        let base = directory_server(Arc::new(AtomicUsize::new(0))).await;

        let provinces = client(&base, "ok").provinces().await.unwrap();
        assert_eq!(
            provinces,
            vec![
                ProvinceRecord {
                    name_with_type: "Thành phố Hồ Chí Minh".to_string()
                },
                ProvinceRecord {
                    name_with_type: "Tỉnh An Giang".to_string()
                },
            ]
        );

        assert_eq!(
            client(&base, "broken").districts().await,
            Err(DirectoryError::Http { status: 500 })
        );
        assert_eq!(
            client(&base, "limited").provinces().await,
            Err(DirectoryError::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_queued_fetch_gives_up_on_persistent_rate_limit() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = directory_server(hits.clone()).await;
        let limited = client(&base, "limited");
        let queue = RequestQueue::new(Duration::from_millis(1));
        let policy = fast_retry();

        let result = queue
            .add(move || async move {
                fetch_with_retry("provinces", policy, || limited.provinces()).await
            })
            .await;

        assert_eq!(result, Err(DirectoryError::RateLimited));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }
}
