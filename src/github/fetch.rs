use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("connection pool closed")]
    PoolClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully-prepared request: headers are already attached by the Fetcher.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Performs a single HTTP exchange. No retries, no status interpretation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Wall-clock time and suspension, separated out so backoff can be tested
/// without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_unix(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Transport backed by a shared reqwest connection pool.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(max_connections: usize) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(max_connections)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Explicit fetcher settings; built from `Config::fetcher_config`.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Sent as a bearer token when present
    pub token: Option<String>,
    pub user_agent: String,
    /// Ceiling on simultaneous outstanding requests across every task
    pub max_connections: usize,
    /// Rate-limit retries per request
    pub max_retries: u32,
    /// Lower bound on any rate-limit wait
    pub min_backoff: Duration,
    /// Upper bound on any rate-limit wait
    pub max_backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            token: None,
            user_agent: "issue-harvester".to_string(),
            max_connections: 30,
            max_retries: 3,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(3600),
        }
    }
}

/// GitHub JSON fetcher.
///
/// Every failure degrades to an empty JSON object so one bad URL never
/// aborts a harvest; callers treat `{}` as "no data". Rate-limit responses
/// are waited out and retried up to `max_retries` times. Cloning is cheap and
/// all clones share one connection ceiling.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: Arc<FetcherConfig>,
    connections: Arc<Semaphore>,
}

impl Fetcher {
    /// Production fetcher: reqwest transport, wall clock.
    pub fn new(config: FetcherConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.max_connections)?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_collaborators(
        config: FetcherConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let connections = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            transport,
            clock,
            config: Arc::new(config),
            connections,
        }
    }

    /// GET `url` and decode the body as JSON, or `{}` on any failure.
    #[instrument(skip(self))]
    pub async fn fetch_json(&self, url: &str) -> Value {
        self.request(HttpMethod::Get, url, None).await
    }

    /// POST `body` to `url` and decode the response as JSON, or `{}` on any failure.
    #[allow(dead_code)]
    #[instrument(skip(self, body))]
    pub async fn post_json(&self, url: &str, body: &Value) -> Value {
        self.request(HttpMethod::Post, url, Some(body)).await
    }

    async fn request(&self, method: HttpMethod, url: &str, body: Option<&Value>) -> Value {
        let mut retries = 0;
        loop {
            let response = match self.send_once(method, url, body).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url, error = %e, "request failed");
                    return empty_object();
                }
            };

            if let Some(reset) = rate_limit_reset(&response) {
                if retries >= self.config.max_retries {
                    warn!(url, retries, "rate limit persisted; giving up on request");
                    return empty_object();
                }
                retries += 1;
                let wait = self.backoff_until(reset);
                warn!(url, wait_secs = wait.as_secs(), attempt = retries, "rate limited, backing off");
                self.clock.sleep(wait).await;
                continue;
            }

            if !(200..300).contains(&response.status) {
                warn!(url, status = response.status, "request returned error status");
                return empty_object();
            }

            return parse_body(url, &response.body);
        }
    }

    /// One exchange, holding a connection permit only while it is in flight.
    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| TransportError::PoolClosed)?;
        debug!(url, ?method, "sending request");
        self.transport.send(self.build_request(method, url, body)).await
    }

    fn build_request(&self, method: HttpMethod, url: &str, body: Option<&Value>) -> HttpRequest {
        let mut headers = vec![
            ("Accept".to_string(), ACCEPT_GITHUB_JSON.to_string()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
        ];
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body: body.cloned(),
        }
    }

    /// `reset - now`, clamped to `[min_backoff, max_backoff]`
    fn backoff_until(&self, reset: i64) -> Duration {
        let remaining = u64::try_from(reset.saturating_sub(self.clock.now_unix())).unwrap_or(0);
        Duration::from_secs(remaining)
            .max(self.config.min_backoff)
            .min(self.config.max_backoff.max(self.config.min_backoff))
    }
}

/// Reset timestamp of a rate-limited response, if this is one.
fn rate_limit_reset(response: &HttpResponse) -> Option<i64> {
    if response.status != 403 && response.status != 429 {
        return None;
    }
    response.header(RATE_LIMIT_RESET)?.trim().parse().ok()
}

fn parse_body(url: &str, body: &str) -> Value {
    if body.trim().is_empty() {
        return empty_object();
    }
    serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(url, error = %e, "response body is not JSON");
        empty_object()
    })
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
