// Scriptable in-process API used as a `Transport` in tests and demos.
// Routes answer with canned bodies; failures, outages and latency can be
// injected the same way for every route.

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::ApiError,
    http::{HttpMethod, HttpRequest, HttpResponse, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Normal,
    CompleteOutage,
    TimingOut,
}

type Route = (HttpMethod, String);

#[derive(Default)]
pub struct MockServer {
    mode: AtomicU8,
    request_count: AtomicUsize,
    fail_next_requests: AtomicUsize,
    delay_ms: AtomicUsize,
    routes: Mutex<HashMap<Route, HttpResponse>>,
    queued: Mutex<HashMap<Route, VecDeque<HttpResponse>>>,
    recent_requests: Mutex<Vec<HttpRequest>>,
}

// "http://host:port/api/trips" -> "/api/trips"
pub fn path_of(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| &url[i + 3..]).unwrap_or(url);
    match after_scheme.find('/') {
        Some(i) => {
            let path = &after_scheme[i..];
            path.split('?').next().unwrap_or(path)
        }
        None => "/",
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: ServerMode) {
        let mode_value = match mode {
            ServerMode::Normal => 0,
            ServerMode::CompleteOutage => 1,
            ServerMode::TimingOut => 2,
        };
        self.mode.store(mode_value, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay_ms: usize) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    // The next `count` requests answer 500 whatever the route
    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next_requests.store(count, Ordering::SeqCst);
    }

    /// Standing answer for a route, used whenever nothing is queued.
    pub fn respond_json(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            (method, path.to_string()),
            HttpResponse::new(status, body.to_string()),
        );
    }

    /// One-shot answer, consumed in FIFO order before the standing one.
    pub fn enqueue_json(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.queued
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(HttpResponse::new(status, body.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.recent_requests.lock().clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        self.recent_requests
            .lock()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .cloned()
            .collect()
    }

    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        let route = (request.method, path_of(&request.url).to_string());
        self.recent_requests.lock().push(request);

        // Simulate delay
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        match self.mode.load(Ordering::SeqCst) {
            1 => return Err(ApiError::Network("Service unavailable".to_string())),
            2 => return Err(ApiError::Timeout(delay as u64)),
            _ => {}
        }

        // Simulate failures
        let failed = self
            .fail_next_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Ok(HttpResponse::new(
                500,
                r#"{"success":false,"message":"Internal Server Error"}"#,
            ));
        }

        if let Some(response) = self
            .queued
            .lock()
            .get_mut(&route)
            .and_then(|queue| queue.pop_front())
        {
            return Ok(response);
        }

        Ok(self.routes.lock().get(&route).cloned().unwrap_or_else(|| {
            HttpResponse::new(404, r#"{"success":false,"message":"Not found"}"#)
        }))
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.handle(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, url)
    }

    #[test]
    fn path_extraction() {
        assert_eq!(path_of("http://localhost:5000/api/trips"), "/api/trips");
        assert_eq!(path_of("https://h/api/trips?page=1"), "/api/trips");
        assert_eq!(path_of("https://h"), "/");
    }

    #[tokio::test]
    async fn queued_answers_come_before_the_standing_one() {
        let server = MockServer::new();
        server.respond_json(HttpMethod::Get, "/api/trips", 200, "standing");
        server.enqueue_json(HttpMethod::Get, "/api/trips", 503, "first");

        let first = server.handle(get("http://h/api/trips")).await.unwrap();
        let second = server.handle(get("http://h/api/trips")).await.unwrap();
        assert_eq!(first.status, 503);
        assert_eq!(second.body, "standing".as_bytes());
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn injected_failures_and_outage() {
        let server = MockServer::new();
        server.respond_json(HttpMethod::Get, "/x", 200, "{}");
        server.fail_next_requests(1);

        assert_eq!(server.handle(get("http://h/x")).await.unwrap().status, 500);
        assert_eq!(server.handle(get("http://h/x")).await.unwrap().status, 200);

        server.set_mode(ServerMode::CompleteOutage);
        assert!(matches!(
            server.handle(get("http://h/x")).await,
            Err(ApiError::Network(_))
        ));
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let server = MockServer::new();
        let response = server.handle(get("http://h/nowhere")).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(server.requests_to(HttpMethod::Get, "/nowhere").len(), 1);
    }
}
