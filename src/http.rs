// HTTP client adapter: plain-data requests, a pluggable transport, bearer
// injection and global 401 handling. No retries here; that is the query
// layer's job.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    error::{ApiError, ClientError},
    models::ApiResponse,
    session::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Executes one round-trip. Implementations report non-2xx statuses as data.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::InitError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let timeout_ms = self.timeout.as_millis() as u64;
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(timeout_ms)
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(timeout_ms)
            } else {
                ApiError::Network(e.to_string())
            }
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Where the embedding application sends the user when the session dies.
pub trait Navigator: Send + Sync + 'static {
    fn redirect(&self, route: &str);
}

#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, route: &str) {
        warn!(route, "session expired, redirect requested");
    }
}

pub struct HttpClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl HttpClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            transport,
            session,
            navigator,
        }
    }

    pub fn with_reqwest(
        config: ClientConfig,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        Ok(Self::new(config, transport, session, navigator))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    pub fn build<B: Serialize>(
        &self,
        method: HttpMethod,
        url: String,
        query: Vec<(String, String)>,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError> {
        let mut request = HttpRequest::new(method, url);
        request.query = query;
        request
            .headers
            .push(("accept".to_string(), "application/json".to_string()));
        if let Some(body) = body {
            let body =
                serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
            request
                .headers
                .push(("content-type".to_string(), "application/json".to_string()));
            request.body = Some(body);
        }
        Ok(request)
    }

    pub async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Some(token) = self.session.token() {
            request
                .headers
                .push(("authorization".to_string(), format!("Bearer {token}")));
        }

        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = self.transport.execute(request).await?;

        if response.is_success() {
            return Ok(response);
        }
        if response.status == 401 {
            warn!("401 from API, clearing session");
            self.session.clear();
            self.navigator.redirect(&self.config.login_route);
            let (message, _) = server_text(&response.body);
            return Err(ApiError::Unauthorized { message });
        }
        Err(error_from_response(&response))
    }

    pub async fn send_json<B, T>(
        &self,
        method: HttpMethod,
        url: String,
        query: Vec<(String, String)>,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = self.build(method, url, query, body)?;
        let response = self.execute(request).await?;
        decode(&response.body)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.send_json::<(), T>(HttpMethod::Get, self.url(path), query, None)
            .await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(HttpMethod::Post, self.url(path), Vec::new(), Some(body))
            .await
    }

    pub async fn put_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json::<(), T>(HttpMethod::Put, self.url(path), Vec::new(), None)
            .await
    }
}

// An empty 2xx body decodes as JSON null so `ApiResponse<Value>` still works
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return serde_json::from_slice(b"null").map_err(ApiError::from);
    }
    serde_json::from_slice(body).map_err(ApiError::from)
}

fn server_text(body: &Bytes) -> (Option<String>, Vec<String>) {
    match serde_json::from_slice::<ApiResponse<serde_json::Value>>(body) {
        Ok(envelope) => (envelope.message, envelope.errors),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            // Plain-text bodies are messages; HTML error pages are not
            let message = (!text.is_empty() && !text.starts_with('<')).then_some(text);
            (message, Vec::new())
        }
    }
}

fn error_from_response(response: &HttpResponse) -> ApiError {
    let (message, errors) = server_text(&response.body);
    ApiError::Api {
        status: response.status,
        message,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::MockServer;
    use crate::storage::MemoryStorage;
    use crate::models::UserProfile;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, route: &str) {
            self.routes.lock().push(route.to_string());
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            id: 1,
            first_name: "Omar".into(),
            last_name: "Farouk".into(),
            email: "omar@example.com".into(),
            role: "Customer".into(),
        }
    }

    fn client(server: Arc<MockServer>) -> (HttpClient, Arc<SessionStore>, Arc<RecordingNavigator>) {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let navigator = Arc::new(RecordingNavigator::default());
        let client = HttpClient::new(
            ClientConfig::new("http://api.test/api"),
            server,
            session.clone(),
            navigator.clone(),
        );
        (client, session, navigator)
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_signed_in() {
        let server = Arc::new(MockServer::new());
        server.respond_json(HttpMethod::Get, "/api/trips/1", 200, r#"{"success":true,"data":{}}"#);
        let (client, session, _) = client(server.clone());

        client
            .get_json::<serde_json::Value>("/trips/1", Vec::new())
            .await
            .unwrap();
        assert!(server.requests()[0].header("authorization").is_none());

        session.establish("jwt-9", &user()).unwrap();
        client
            .get_json::<serde_json::Value>("/trips/1", Vec::new())
            .await
            .unwrap();
        assert_eq!(server.requests()[1].header("Authorization"), Some("Bearer jwt-9"));
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_redirects() {
        let server = Arc::new(MockServer::new());
        server.respond_json(HttpMethod::Get, "/api/bookings/my-bookings", 401, "");
        let (client, session, navigator) = client(server);
        session.establish("expired", &user()).unwrap();

        let err = client
            .get_json::<serde_json::Value>("/bookings/my-bookings", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized { message: None });
        assert!(!session.is_authenticated());
        assert_eq!(navigator.routes.lock().as_slice(), ["/login".to_string()]);
    }

    #[tokio::test]
    async fn unauthorized_keeps_the_server_message() {
        let server = Arc::new(MockServer::new());
        server.respond_json(
            HttpMethod::Post,
            "/api/auth/login",
            401,
            r#"{"success":false,"message":"Invalid email or password"}"#,
        );
        let (client, _, _) = client(server);

        let err = client
            .post_json::<_, serde_json::Value>("/auth/login", &serde_json::json!({"email": "a@b.c"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Unauthorized {
                message: Some("Invalid email or password".into())
            }
        );
    }

    #[tokio::test]
    async fn server_errors_carry_envelope_message() {
        let server = Arc::new(MockServer::new());
        server.respond_json(
            HttpMethod::Post,
            "/api/bookings",
            400,
            r#"{"success":false,"message":"No seats left","errors":["participants"]}"#,
        );
        let (client, _, navigator) = client(server);

        let err = client
            .post_json::<_, serde_json::Value>("/bookings", &serde_json::json!({"tripId": 1}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Api {
                status: 400,
                message: Some("No seats left".into()),
                errors: vec!["participants".into()],
            }
        );
        assert!(navigator.routes.lock().is_empty());
    }

    #[tokio::test]
    async fn html_error_pages_have_no_message() {
        let server = Arc::new(MockServer::new());
        server.respond_json(HttpMethod::Get, "/api/trips", 502, "<html>Bad gateway</html>");
        let (client, _, _) = client(server);

        let err = client
            .get_json::<serde_json::Value>("/trips", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.user_message(), crate::error::GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn build_serializes_body_and_sets_content_type() {
        let (client, _, _) = client(Arc::new(MockServer::new()));
        let request = client
            .build(
                HttpMethod::Post,
                client.url("/contact"),
                Vec::new(),
                Some(&serde_json::json!({"name": "Hana"})),
            )
            .unwrap();
        assert_eq!(request.url, "http://api.test/api/contact");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"Hana"}"#));
    }
}
