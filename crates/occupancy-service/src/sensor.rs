//! HTTP client for the sensor's live-count endpoints.
//!
//! Sensor firmware versions expose the live counters under different paths,
//! so the client walks the configured endpoint list until one answers with a
//! body the caller recognizes. A 200 login or status page does not stop the
//! walk.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::SensorConfig;

/// Error type for sensor requests.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The sensor is not reachable or timed out.
    #[error("Sensor not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The sensor answered with a non-success status.
    #[error("Sensor returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// No endpoints are configured.
    #[error("No sensor endpoints configured")]
    NoEndpoints,
}

impl SensorError {
    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SensorError::NotReachable { source, .. } if source.is_timeout())
    }
}

/// A raw response from a live-count endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorResponse {
    /// The URL that answered.
    pub url: String,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
}

/// HTTP client for one sensor.
#[derive(Debug, Clone)]
pub struct SensorClient {
    client: Client,
    urls: Vec<String>,
    credentials: Option<(String, Option<String>)>,
}

impl SensorClient {
    /// Create a client from the sensor configuration.
    pub fn new(config: &SensorConfig) -> Result<Self, SensorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SensorError::Client)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(config: &SensorConfig, client: Client) -> Self {
        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));
        Self {
            client,
            urls: config.endpoint_urls(),
            credentials,
        }
    }

    /// Endpoint URLs in the order they are tried.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Fetch from the first endpoint whose body `recognize` accepts.
    ///
    /// Endpoints that fail or answer with an unrecognized body are skipped.
    /// If endpoints answered but none was recognized, the first of those
    /// answers is returned with `None`. If none answered at all, the last
    /// endpoint's error is returned.
    pub async fn fetch_recognized<T>(
        &self,
        mut recognize: impl FnMut(&SensorResponse) -> Option<T>,
    ) -> Result<(SensorResponse, Option<T>), SensorError> {
        let mut last_error = SensorError::NoEndpoints;
        let mut unrecognized = None;
        for url in &self.urls {
            match self.get(url).await {
                Ok(response) => match recognize(&response) {
                    Some(value) => return Ok((response, Some(value))),
                    None => {
                        debug!("Sensor endpoint {} answered with an unrecognized body", url);
                        unrecognized.get_or_insert(response);
                    }
                },
                Err(e) => {
                    debug!("Sensor endpoint {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }
        unrecognized.map(|r| (r, None)).ok_or(last_error)
    }

    async fn get(&self, url: &str) -> Result<SensorResponse, SensorError> {
        let mut request = self.client.get(url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_deref());
        }

        let not_reachable = |source| SensorError::NotReachable {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(not_reachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SensorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(not_reachable)?;

        Ok(SensorResponse {
            url: url.to_string(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn fetch_any(client: &SensorClient) -> Result<SensorResponse, SensorError> {
        client.fetch_recognized(|_| Some(())).await.map(|(r, _)| r)
    }

    fn config(base_url: String, endpoints: &[&str]) -> SensorConfig {
        SensorConfig {
            base_url,
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            timeout_secs: 2,
            ..SensorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_next_endpoint() {
        let app = Router::new()
            .route("/api/v5/live", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/counts",
                get(|| async {
                    (
                        [("content-type", "application/json")],
                        r#"{"count_in": 12, "count_out": 4}"#,
                    )
                }),
            );
        let base = serve(app).await;

        let client = SensorClient::new(&config(base.clone(), &["/api/v5/live", "/counts"])).unwrap();
        let response = fetch_any(&client).await.unwrap();
        assert_eq!(response.url, format!("{}/counts", base));
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert!(response.body.contains("count_in"));
    }

    #[tokio::test]
    async fn test_fetch_skips_unrecognized_bodies() {
        let app = Router::new()
            .route(
                "/api/v5/live",
                get(|| async { ([("content-type", "text/html")], "<html>Login</html>") }),
            )
            .route("/api/v5/counts", get(|| async { StatusCode::NOT_FOUND }))
            .route("/counts", get(|| async { r#"{"in": 3}"# }));
        let base = serve(app).await;

        let client = SensorClient::new(&config(
            base.clone(),
            &["/api/v5/live", "/api/v5/counts", "/counts"],
        ))
        .unwrap();
        let (response, found) = client
            .fetch_recognized(|r| r.body.contains("\"in\"").then_some(()))
            .await
            .unwrap();
        assert_eq!(response.url, format!("{}/counts", base));
        assert!(found.is_some());

        // Nothing recognized: the first answer comes back without a value
        let (response, found) = client.fetch_recognized(|_| None::<()>).await.unwrap();
        assert_eq!(response.url, format!("{}/api/v5/live", base));
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;

        let mut sensor = config(base, &["/slow"]);
        sensor.timeout_secs = 1;
        let client = SensorClient::new(&sensor).unwrap();
        let err = fetch_any(&client).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_fetch_reports_last_error() {
        let app = Router::new().route("/a", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;

        let client = SensorClient::new(&config(base, &["/a"])).unwrap();
        let err = fetch_any(&client).await.unwrap_err();
        assert!(matches!(err, SensorError::Status { status: 503, .. }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_fetch_sends_basic_auth() {
        let app = Router::new().route(
            "/counts",
            get(|headers: HeaderMap| async move {
                // "admin:pass"
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Basic YWRtaW46cGFzcw==") => (StatusCode::OK, "<in>1</in><out>0</out>"),
                    _ => (StatusCode::UNAUTHORIZED, ""),
                }
            }),
        );
        let base = serve(app).await;

        let mut sensor = config(base.clone(), &["/counts"]);
        let anonymous = SensorClient::new(&sensor).unwrap();
        assert!(matches!(
            fetch_any(&anonymous).await,
            Err(SensorError::Status { status: 401, .. })
        ));

        sensor.username = Some("admin".to_string());
        sensor.password = Some("pass".to_string());
        let client = SensorClient::new(&sensor).unwrap();
        assert_eq!(fetch_any(&client).await.unwrap().body, "<in>1</in><out>0</out>");
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let client = SensorClient::new(&config("http://127.0.0.1:1".to_string(), &[])).unwrap();
        assert!(client.urls().is_empty());
        assert!(matches!(fetch_any(&client).await, Err(SensorError::NoEndpoints)));
    }
}
