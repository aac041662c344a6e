//! In-memory collaborators for exercising the Fetcher and the pipeline
//! without a network.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fetch::{
    Clock, Fetcher, FetcherConfig, HttpRequest, HttpResponse, Transport, TransportError,
};

pub const API: &str = "https://api.test";
pub const ISSUES_ENDPOINT: &str = "https://api.test/repos/o/r/issues";

/// Transport answering from per-URL response queues. The last queued
/// response for a URL is repeated; unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Duration,
    delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every exchange takes `latency` of (tokio) time, so overlapping
    /// requests are observable.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Make `url` take `delay` instead of the default latency.
    pub fn slow_down(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn respond_json(&self, url: &str, value: Value) {
        self.respond(url, json_response(200, value));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> HttpResponse {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => json_response(404, json!({"message": "Not Found"})),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&url)
            .copied()
            .unwrap_or(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self.next_response(&url);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(response)
    }
}

/// Clock frozen at a fixed instant that records sleeps instead of taking them.
pub struct RecordingClock {
    now: i64,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn at(now: i64) -> Self {
        Self {
            now,
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now_unix(&self) -> i64 {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn json_response(status: u16, value: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: value.to_string(),
    }
}

pub fn fetcher_with(transport: &Arc<ScriptedTransport>, clock: &Arc<RecordingClock>) -> Fetcher {
    Fetcher::with_collaborators(FetcherConfig::default(), transport.clone(), clock.clone())
}

pub fn events_url(number: u64) -> String {
    format!("{}/repos/o/r/issues/{}/events", API, number)
}

pub fn comments_url(number: u64) -> String {
    format!("{}/repos/o/r/issues/{}/comments", API, number)
}

pub fn commit_url(sha: &str) -> String {
    format!("{}/repos/o/r/commits/{}", API, sha)
}

pub fn page_url(page: u32) -> String {
    format!("{}?state=closed&per_page=100&page={}", ISSUES_ENDPOINT, page)
}

/// A listing entry for issue `number` of repository o/r.
pub fn issue_json(number: u64) -> Value {
    json!({
        "number": number,
        "title": format!("Issue {}", number),
        "body": format!("Body of issue {}", number),
        "state": "closed",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-02T10:00:00Z",
        "closed_at": "2024-03-02T10:00:00Z",
        "labels": [{"name": "bug"}],
        "user": {"login": "reporter"},
        "assignee": null,
        "comments": 1,
        "events_url": events_url(number),
        "comments_url": comments_url(number),
        "html_url": format!("https://github.com/o/r/issues/{}", number),
    })
}

/// A listing entry that is really a pull request.
pub fn pull_request_json(number: u64) -> Value {
    let mut value = issue_json(number);
    value["pull_request"] = json!({"url": format!("{}/repos/o/r/pulls/{}", API, number)});
    value
}

/// `count` consecutive issues starting at `first`.
pub fn issue_page(first: u64, count: u64) -> Value {
    Value::Array((first..first + count).map(issue_json).collect())
}
