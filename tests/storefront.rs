// End-to-end flows through the public `Storefront` API against the mock server

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use trip_storefront::{
    http::HttpMethod,
    mock_server::{MockServer, ServerMode},
    models::{BookingRequest, LoginRequest},
    storage::{TOKEN_KEY, USER_KEY},
    ApiError, ClientConfig, CredentialStorage, FileStorage, MemoryStorage, MyBookingsQuery,
    Navigator, Storefront, TripQuery,
};

#[derive(Default)]
struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }
}

struct Harness {
    storefront: Storefront,
    server: Arc<MockServer>,
    navigator: Arc<RecordingNavigator>,
}

fn harness_with(storage: Arc<dyn CredentialStorage>) -> Harness {
    let server = Arc::new(MockServer::new());
    let navigator = Arc::new(RecordingNavigator::default());
    let storefront = Storefront::with_transport(
        ClientConfig::new("http://storefront.test/api"),
        server.clone(),
        storage,
        navigator.clone(),
    );
    Harness {
        storefront,
        server,
        navigator,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryStorage::new()))
}

fn login_body(token: &str) -> String {
    json!({
        "success": true,
        "message": "ok",
        "data": {
            "token": token,
            "user": {"id": 3, "firstName": "Yara", "lastName": "Mostafa", "email": "yara@example.com", "role": "Customer"}
        }
    })
    .to_string()
}

fn credentials() -> LoginRequest {
    LoginRequest {
        email: "yara@example.com".into(),
        password: "pw".into(),
    }
}

fn trip_page(ids: std::ops::RangeInclusive<u64>, total: u64, page: u32, page_size: u32) -> String {
    let items: Vec<_> = ids
        .map(|id| json!({"id": id, "title": format!("Trip {id}"), "titleAr": format!("رحلة {id}"), "price": 1200.0, "maxParticipants": 20, "availableSpots": 5}))
        .collect();
    json!({
        "success": true,
        "data": {"items": items, "totalCount": total, "page": page, "pageSize": page_size}
    })
    .to_string()
}

#[tokio::test]
async fn signed_in_requests_carry_the_token_until_a_401() {
    let h = harness();
    h.server.respond_json(HttpMethod::Post, "/api/auth/login", 200, &login_body("jwt-live"));
    h.server.respond_json(
        HttpMethod::Get,
        "/api/bookings/my-bookings",
        200,
        r#"{"success":true,"data":{"items":[{"id":1,"status":"Confirmed"}],"totalCount":1}}"#,
    );

    assert!(h.storefront.auth.login(&credentials()).await.success);
    let bookings = h.storefront.queries.my_bookings(MyBookingsQuery::default());
    let state = bookings.fetch().await;
    assert!(state.is_success());
    assert_eq!(state.data.unwrap().items[0].status, trip_storefront::BookingStatus::Confirmed);
    assert_eq!(
        h.server.requests()[1].header("authorization"),
        Some("Bearer jwt-live")
    );

    // Session revoked server side
    h.server.enqueue_json(HttpMethod::Get, "/api/bookings/my-bookings", 401, "");
    let state = bookings.refetch().await;
    assert!(matches!(state.error, Some(ApiError::Unauthorized { .. })));
    assert!(!h.storefront.auth.is_authenticated());
    assert_eq!(h.navigator.routes.lock().as_slice(), ["/login".to_string()]);
    // 401 is final: no retry
    assert_eq!(h.server.requests_to(HttpMethod::Get, "/api/bookings/my-bookings").len(), 2);
}

#[tokio::test]
async fn session_survives_restart_through_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");

    let first = harness_with(Arc::new(FileStorage::new(&path)));
    first.server.respond_json(HttpMethod::Post, "/api/auth/login", 200, &login_body("jwt-disk"));
    assert!(first.storefront.auth.login(&credentials()).await.success);
    drop(first);

    let second = harness_with(Arc::new(FileStorage::new(&path)));
    assert!(second.storefront.auth.is_authenticated());
    assert_eq!(second.storefront.auth.token().as_deref(), Some("jwt-disk"));

    second.storefront.auth.logout();
    let storage = FileStorage::new(&path);
    assert_eq!(assert_ok!(storage.get(TOKEN_KEY)), None);
    assert_eq!(assert_ok!(storage.get(USER_KEY)), None);
}

#[tokio::test]
async fn half_written_session_starts_signed_out() {
    let storage = Arc::new(MemoryStorage::with_entries(&[(TOKEN_KEY, "dangling")]));
    let h = harness_with(storage.clone());

    assert!(!h.storefront.auth.is_authenticated());
    assert!(h.storefront.session().token().is_none());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn filtered_trip_page() {
    let h = harness();
    h.server.respond_json(HttpMethod::Get, "/api/trips", 200, &trip_page(10..=18, 20, 2, 9));

    let trips = h.storefront.queries.trips(TripQuery {
        category_id: Some(3),
        ..TripQuery::page(2, 9)
    });
    let state = trips.fetch().await;
    let page = state.data.expect("trip page");

    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    assert!(page.items.len() <= 9);
    let first = &page.items[0];
    assert_eq!(first.title_ar, "رحلة 10");
    assert_eq!(first.remaining_count, 5);
    assert_eq!(first.category.id, 0);
    assert!(!first.is_fully_booked());
}

#[tokio::test]
async fn identical_queries_share_requests_and_cache() {
    let h = harness();
    h.server.respond_json(HttpMethod::Get, "/api/trips", 200, &trip_page(1..=12, 40, 1, 12));
    h.server.set_delay(20);

    let a = h.storefront.queries.trips(TripQuery::default());
    let b = h.storefront.queries.trips(TripQuery::default());
    let (sa, sb) = tokio::join!(a.fetch(), b.fetch());
    assert!(sa.is_success() && sb.is_success());
    assert_eq!(h.server.request_count(), 1);

    // Still fresh: a third handle is served from cache
    let c = h.storefront.queries.trips(TripQuery::default());
    assert_eq!(c.fetch().await.data.map(|p| p.items.len()), Some(12));
    assert_eq!(h.server.request_count(), 1);

    let stats = h.storefront.cache().stats();
    assert_eq!(stats.dedup_count, 1);
    assert_eq!(stats.hit_count, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
    let h = harness();
    h.server.respond_json(HttpMethod::Get, "/api/trips/featured", 200, r#"[{"id":1},{"id":2},{"id":3}]"#);
    h.server.fail_next_requests(2);

    let started = tokio::time::Instant::now();
    let state = h.storefront.queries.featured_trips(3).fetch().await;

    assert!(state.is_success());
    assert_eq!(state.data.unwrap().len(), 3);
    assert_eq!(h.server.request_count(), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn outage_ends_in_error_state_after_three_attempts() {
    let h = harness();
    h.server.set_mode(ServerMode::CompleteOutage);

    let state = h.storefront.queries.categories(Default::default()).fetch().await;
    assert!(state.is_error());
    assert!(!state.is_empty());
    assert_eq!(h.server.request_count(), 3);
    assert!(matches!(state.error, Some(ApiError::Network(_))));
}

#[tokio::test]
async fn booking_refreshes_trip_availability() {
    let h = harness();
    h.server.enqueue_json(
        HttpMethod::Get,
        "/api/trips/5",
        200,
        r#"{"success":true,"data":{"id":5,"maxParticipants":10,"availableSpots":1}}"#,
    );
    h.server.enqueue_json(
        HttpMethod::Get,
        "/api/trips/5",
        200,
        r#"{"success":true,"data":{"id":5,"maxParticipants":10,"availableSpots":0,"status":"Active"}}"#,
    );
    h.server.respond_json(
        HttpMethod::Post,
        "/api/bookings",
        200,
        r#"{"success":true,"data":{"id":90,"tripId":5,"participants":1}}"#,
    );

    let trip = h.storefront.queries.trip(5);
    assert!(!trip.fetch().await.data.unwrap().is_fully_booked());

    let outcome = h
        .storefront
        .bookings
        .create(&BookingRequest {
            trip_id: 5,
            participants: 1,
            special_requests: Some("window seat".into()),
            contact_name: "Yara".into(),
            contact_email: "yara@example.com".into(),
            contact_phone: "0100".into(),
        })
        .await;
    assert!(outcome.success);

    // Invalidated, so this goes back to the server
    let refreshed = trip.fetch().await.data.unwrap();
    assert!(refreshed.is_fully_booked());
    assert_eq!(refreshed.booked_count(), 10);
    assert_eq!(h.server.requests_to(HttpMethod::Get, "/api/trips/5").len(), 2);

    let sent = &h.server.requests_to(HttpMethod::Post, "/api/bookings")[0];
    let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["tripId"], 5);
    assert_eq!(body["specialRequests"], "window seat");
}

#[tokio::test]
async fn disabled_detail_query_sends_nothing() {
    let h = harness();
    let state = h.storefront.queries.booking(0).fetch().await;
    assert!(state.is_idle());
    assert_eq!(h.server.request_count(), 0);
}

#[tokio::test]
async fn health_report() {
    let h = harness();
    h.server.respond_json(HttpMethod::Get, "/health", 200, r#"{"status":"Healthy"}"#);
    h.server.respond_json(HttpMethod::Get, "/api/health/database", 200, r#"{"status":"Healthy"}"#);

    let report = h.storefront.health.check().await;
    assert!(report.all_healthy());

    h.server.set_mode(ServerMode::CompleteOutage);
    let report = h.storefront.health.check().await;
    assert!(!report.api.healthy);
    assert!(report.api.error.is_some());
}

#[test]
fn storefront_builds_over_reqwest() {
    let config = assert_ok!(ClientConfig::from_lookup(|key| match key {
        "STOREFRONT_API_BASE_URL" => Some("http://localhost:5000/api/".to_string()),
        _ => None,
    }));
    assert_eq!(config.base_url, "http://localhost:5000/api");
    assert_ok!(Storefront::new(
        config,
        Arc::new(MemoryStorage::new()),
        Arc::new(trip_storefront::http::LogNavigator),
    ));

    assert_err!(ClientConfig::from_lookup(|key| (key == "STOREFRONT_TIMEOUT_MS").then(|| "soon".to_string())));
}
