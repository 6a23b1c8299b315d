// One narrow client per REST resource. These build query strings, call the
// adapter and hand back the raw envelope; mapping happens further up.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{
    error::ApiError,
    http::{HttpClient, HttpMethod},
    mappers::BookingStatus,
    models::{
        ApiResponse, AuthResponse, BookingRequest, ContactRequest, ListResponse, LoginRequest,
        RawBooking, RawCategory, RawTrip, RefreshRequest, RegisterRequest,
    },
};

/// Query string made only of parameters that are actually set. `None`, empty
/// strings and unset flags never reach the wire, so the server cannot read
/// them as filters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value.map(|v| v.to_string()) {
            Some(v) if !v.trim().is_empty() => self.push(key, v),
            _ => self,
        }
    }

    pub fn push_flag(self, key: &str, value: bool) -> Self {
        if value {
            self.push(key, "true")
        } else {
            self
        }
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub category_id: Option<u64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_descending: bool,
}

impl Default for TripQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 12,
            search: None,
            category_id: None,
            min_price: None,
            max_price: None,
            sort_by: None,
            sort_descending: false,
        }
    }
}

impl TripQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .push("page", self.page)
            .push("pageSize", self.page_size)
            .push_opt("search", self.search.as_deref())
            .push_opt("categoryId", self.category_id)
            .push_opt("minPrice", self.min_price)
            .push_opt("maxPrice", self.max_price)
            .push_opt("sortBy", self.sort_by.as_deref())
            .push_flag("sortDescending", self.sort_descending)
    }
}

pub const DEFAULT_CATEGORY_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_descending: bool,
    pub is_active: Option<bool>,
}

impl CategoryQuery {
    pub fn active() -> Self {
        Self {
            is_active: Some(true),
            page_size: Some(50),
            ..Default::default()
        }
    }

    pub fn effective_page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_CATEGORY_PAGE_SIZE)
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .push("page", self.effective_page())
            .push("pageSize", self.effective_page_size())
            .push_opt("search", self.search.as_deref())
            .push_opt("sortBy", self.sort_by.as_deref())
            .push_flag("sortDescending", self.sort_descending)
            .push_opt("isActive", self.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyBookingsQuery {
    pub page: u32,
    pub page_size: u32,
    pub status: Option<BookingStatus>,
}

impl Default for MyBookingsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            status: None,
        }
    }
}

impl MyBookingsQuery {
    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .push("page", self.page)
            .push("pageSize", self.page_size)
            .push_opt("status", self.status.map(|s| s.as_str()))
    }
}

#[derive(Clone)]
pub struct TripsApi {
    http: Arc<HttpClient>,
}

impl TripsApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn get_all(&self, query: &TripQuery) -> Result<ListResponse<RawTrip>, ApiError> {
        self.http
            .get_json("/trips", query.to_params().into_vec())
            .await
    }

    pub async fn get_by_id(&self, id: u64) -> Result<ApiResponse<RawTrip>, ApiError> {
        self.http.get_json(&format!("/trips/{id}"), Vec::new()).await
    }

    pub async fn get_featured(&self, count: u32) -> Result<ListResponse<RawTrip>, ApiError> {
        let query = QueryParams::new().push("count", count).into_vec();
        self.http.get_json("/trips/featured", query).await
    }
}

#[derive(Clone)]
pub struct CategoriesApi {
    http: Arc<HttpClient>,
}

impl CategoriesApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn get_all(
        &self,
        query: &CategoryQuery,
    ) -> Result<ListResponse<RawCategory>, ApiError> {
        self.http
            .get_json("/categories", query.to_params().into_vec())
            .await
    }

    pub async fn get_active(&self) -> Result<ListResponse<RawCategory>, ApiError> {
        self.http.get_json("/categories/active", Vec::new()).await
    }

    pub async fn get_by_id(&self, id: u64) -> Result<ApiResponse<RawCategory>, ApiError> {
        self.http
            .get_json(&format!("/categories/{id}"), Vec::new())
            .await
    }
}

#[derive(Clone)]
pub struct BookingsApi {
    http: Arc<HttpClient>,
}

impl BookingsApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn create(&self, booking: &BookingRequest) -> Result<ApiResponse<RawBooking>, ApiError> {
        self.http.post_json("/bookings", booking).await
    }

    pub async fn get_my_bookings(
        &self,
        query: &MyBookingsQuery,
    ) -> Result<ListResponse<RawBooking>, ApiError> {
        self.http
            .get_json("/bookings/my-bookings", query.to_params().into_vec())
            .await
    }

    pub async fn get_by_id(&self, id: u64) -> Result<ApiResponse<RawBooking>, ApiError> {
        self.http
            .get_json(&format!("/bookings/{id}"), Vec::new())
            .await
    }

    pub async fn cancel(&self, id: u64) -> Result<ApiResponse<Value>, ApiError> {
        self.http.put_json(&format!("/bookings/{id}/cancel")).await
    }
}

#[derive(Clone)]
pub struct ContactApi {
    http: Arc<HttpClient>,
}

impl ContactApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn send_message(&self, message: &ContactRequest) -> Result<ApiResponse<Value>, ApiError> {
        self.http.post_json("/contact", message).await
    }
}

#[derive(Clone)]
pub struct AuthApi {
    http: Arc<HttpClient>,
}

impl AuthApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<ApiResponse<AuthResponse>, ApiError> {
        self.http.post_json("/auth/login", credentials).await
    }

    pub async fn register(&self, user: &RegisterRequest) -> Result<ApiResponse<Value>, ApiError> {
        self.http.post_json("/auth/register", user).await
    }

    // Plain call; nothing in the crate refreshes tokens on its own
    pub async fn refresh_token(
        &self,
        token: &str,
        refresh_token: &str,
    ) -> Result<ApiResponse<AuthResponse>, ApiError> {
        let body = RefreshRequest {
            token: token.to_string(),
            refresh_token: refresh_token.to_string(),
        };
        self.http.post_json("/auth/refresh", &body).await
    }
}

#[derive(Clone)]
pub struct HealthApi {
    http: Arc<HttpClient>,
}

impl HealthApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    // Served at the host root, outside the `/api` prefix
    pub async fn check_api(&self) -> Result<Value, ApiError> {
        let url = self.http.config().health_url();
        self.http
            .send_json::<(), Value>(HttpMethod::Get, url, Vec::new(), None)
            .await
    }

    pub async fn check_database(&self) -> Result<Value, ApiError> {
        self.http.get_json("/health/database", Vec::new()).await
    }
}

/// Every resource client over one shared adapter.
#[derive(Clone)]
pub struct Resources {
    pub trips: TripsApi,
    pub categories: CategoriesApi,
    pub bookings: BookingsApi,
    pub contact: ContactApi,
    pub auth: AuthApi,
    pub health: HealthApi,
}

impl Resources {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            trips: TripsApi::new(http.clone()),
            categories: CategoriesApi::new(http.clone()),
            bookings: BookingsApi::new(http.clone()),
            contact: ContactApi::new(http.clone()),
            auth: AuthApi::new(http.clone()),
            health: HealthApi::new(http),
        }
    }
}
