// Query handles: one per screen-level data need. A handle owns its current
// parameters and a watchable state snapshot, and goes through the shared
// query cache for every load.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::{sync::watch, time::Instant};
use tracing::debug;

use crate::{
    config::RetryConfig,
    error::ApiError,
    mappers::{self, Booking, Category, Trip},
    models::ListParts,
    query::{QueryCache, QueryKey, QueryOptions},
    resources::{CategoryQuery, MyBookingsQuery, Resources, TripQuery},
};

pub const TRIPS: &str = "trips";
pub const TRIP: &str = "trip";
pub const FEATURED_TRIPS: &str = "featuredTrips";
pub const CATEGORIES: &str = "categories";
pub const ACTIVE_CATEGORIES: &str = "activeCategories";
pub const CATEGORY: &str = "category";
pub const MY_BOOKINGS: &str = "myBookings";
pub const BOOKING: &str = "booking";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot published to whoever renders a query.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    /// `data` belongs to the previous parameters while the new ones load.
    pub is_previous_data: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_previous_data: false,
            updated_at: None,
        }
    }
}

// Manual impl: `T` itself does not need to be Clone behind the Arc
impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_previous_data: self.is_previous_data,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ApiError::user_message)
    }
}

impl<T> QueryState<Paged<T>> {
    /// Loaded successfully with nothing in it. Never true for errors.
    pub fn is_empty(&self) -> bool {
        self.is_success() && self.data.as_ref().map_or(true, |page| page.items.is_empty())
    }
}

impl<T> QueryState<Vec<T>> {
    pub fn is_empty(&self) -> bool {
        self.is_success() && self.data.as_ref().map_or(true, |items| items.is_empty())
    }
}

/// One page of a list resource, with totals worked out on the client when the
/// server leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl<T> Paged<T> {
    pub fn from_parts(parts: ListParts<T>, requested_page: u32, requested_page_size: u32) -> Self {
        let bare = parts.total_count.is_none() && parts.page.is_none();
        let page_size = parts.page_size.unwrap_or(requested_page_size);
        let current_page = parts.page.filter(|p| *p > 0).unwrap_or(requested_page.max(1));
        let total_count = parts.total_count.unwrap_or(parts.items.len() as u64);

        let mut items = parts.items;
        // A bare array is the whole collection; cut the requested page out of it
        if bare && page_size > 0 {
            let skip = (current_page as usize - 1) * page_size as usize;
            items = items.into_iter().skip(skip).take(page_size as usize).collect();
        } else if page_size > 0 {
            items.truncate(page_size as usize);
        }

        Self {
            items,
            total_count,
            total_pages: total_pages(total_count, page_size),
            current_page,
            page_size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }
}

pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size as u64) as u32
}

type Fetcher<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;
type EnabledFn<P> = Box<dyn Fn(&P) -> bool + Send + Sync>;

struct HandleInner<P, T> {
    resource: &'static str,
    cache: QueryCache,
    options: QueryOptions,
    fetcher: Fetcher<P, T>,
    enabled: EnabledFn<P>,
    params: Mutex<P>,
    generation: AtomicU64,
    mounted: AtomicBool,
    state: watch::Sender<QueryState<T>>,
}

/// Live query for one resource. Clones share parameters and state.
pub struct QueryHandle<P, T> {
    inner: Arc<HandleInner<P, T>>,
}

impl<P, T> Clone for QueryHandle<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P, T> QueryHandle<P, T>
where
    P: Serialize + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        resource: &'static str,
        cache: QueryCache,
        options: QueryOptions,
        params: P,
        fetcher: F,
    ) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self::with_enabled(resource, cache, options, params, |_| true, fetcher)
    }

    /// Like [`QueryHandle::new`], but only loads while `enabled(params)`
    /// holds. Otherwise the handle stays idle and sends nothing.
    pub fn with_enabled<E, F, Fut>(
        resource: &'static str,
        cache: QueryCache,
        options: QueryOptions,
        params: P,
        enabled: E,
        fetcher: F,
    ) -> Self
    where
        E: Fn(&P) -> bool + Send + Sync + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher<P, T> = Arc::new(move |params| fetcher(params).boxed());
        let (state, _) = watch::channel(QueryState::default());
        Self {
            inner: Arc::new(HandleInner {
                resource,
                cache,
                options,
                fetcher,
                enabled: Box::new(enabled),
                params: Mutex::new(params),
                generation: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
                state,
            }),
        }
    }

    pub fn resource(&self) -> &'static str {
        self.inner.resource
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    pub fn params(&self) -> P {
        self.inner.params.lock().clone()
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        (self.inner.enabled)(&*self.inner.params.lock())
    }

    /// Loads with the current parameters, from cache when fresh.
    pub async fn fetch(&self) -> QueryState<T> {
        self.run(false).await
    }

    /// Loads again bypassing the freshness check.
    pub async fn refetch(&self) -> QueryState<T> {
        self.run(true).await
    }

    /// Switches to new parameters and loads them. A load still running for
    /// the old parameters is discarded when it lands.
    pub async fn set_params(&self, params: P) -> QueryState<T> {
        *self.inner.params.lock() = params;
        self.run(false).await
    }

    /// After this, completions are ignored and the state no longer changes.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    async fn run(&self, force: bool) -> QueryState<T> {
        let inner = &self.inner;
        if !self.is_mounted() {
            return self.state();
        }

        let params = inner.params.lock().clone();
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !(inner.enabled)(&params) {
            debug!(resource = inner.resource, "query disabled, staying idle");
            inner.state.send_modify(|state| *state = QueryState::default());
            return self.state();
        }

        let key = match QueryKey::new(inner.resource, &params) {
            Ok(key) => key,
            Err(e) => {
                inner.state.send_modify(|state| {
                    state.status = QueryStatus::Error;
                    state.error = Some(e);
                    state.is_fetching = false;
                });
                return self.state();
            }
        };

        let cached = inner.cache.peek::<T>(&key);
        let keep_previous = inner.options.keep_previous_data;
        inner.state.send_modify(|state| {
            state.status = QueryStatus::Loading;
            state.error = None;
            state.is_fetching = true;
            match cached {
                Some(data) => {
                    state.data = Some(data);
                    state.is_previous_data = false;
                }
                None if keep_previous && state.data.is_some() => {
                    state.is_previous_data = true;
                }
                None => {
                    state.data = None;
                    state.is_previous_data = false;
                }
            }
        });

        let fetcher = inner.fetcher.clone();
        let result = inner
            .cache
            .fetch(key, &inner.options, force, move || fetcher(params.clone()))
            .await;

        if generation != inner.generation.load(Ordering::SeqCst) || !self.is_mounted() {
            debug!(resource = inner.resource, "discarding superseded response");
            return self.state();
        }

        inner.state.send_modify(|state| {
            state.is_fetching = false;
            match result {
                Ok(data) => {
                    state.status = QueryStatus::Success;
                    state.data = Some(data);
                    state.error = None;
                    state.is_previous_data = false;
                    state.updated_at = Some(Instant::now());
                }
                Err(e) => {
                    state.status = QueryStatus::Error;
                    state.error = Some(e);
                }
            }
        });
        self.state()
    }
}

fn valid_id(id: &u64) -> bool {
    *id != 0
}

/// Factory for every storefront query, all backed by one cache.
#[derive(Clone)]
pub struct StorefrontQueries {
    cache: QueryCache,
    resources: Resources,
    retry: RetryConfig,
}

impl StorefrontQueries {
    pub fn new(cache: QueryCache, resources: Resources) -> Self {
        Self {
            cache,
            resources,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn options(&self, preset: QueryOptions) -> QueryOptions {
        preset.with_retry(self.retry.clone())
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn trips(&self, query: TripQuery) -> QueryHandle<TripQuery, Paged<Trip>> {
        let api = self.resources.trips.clone();
        QueryHandle::new(
            TRIPS,
            self.cache.clone(),
            self.options(QueryOptions::trip_list()),
            query,
            move |query: TripQuery| {
                let api = api.clone();
                async move {
                    let parts = api.get_all(&query).await?.into_parts()?;
                    let page = Paged::from_parts(parts, query.page, query.page_size);
                    Ok::<_, ApiError>(page.map(|raw| mappers::map_trip(&raw)))
                }
            },
        )
    }

    pub fn trip(&self, id: u64) -> QueryHandle<u64, Trip> {
        let api = self.resources.trips.clone();
        QueryHandle::with_enabled(
            TRIP,
            self.cache.clone(),
            self.options(QueryOptions::detail()),
            id,
            valid_id,
            move |id| {
                let api = api.clone();
                async move {
                    let raw = api.get_by_id(id).await?.into_data()?;
                    Ok::<_, ApiError>(mappers::map_trip(&raw))
                }
            },
        )
    }

    pub fn featured_trips(&self, count: u32) -> QueryHandle<u32, Vec<Trip>> {
        let api = self.resources.trips.clone();
        QueryHandle::new(
            FEATURED_TRIPS,
            self.cache.clone(),
            self.options(QueryOptions::featured()),
            count,
            move |count| {
                let api = api.clone();
                async move {
                    let parts = api.get_featured(count).await?.into_parts()?;
                    Ok::<_, ApiError>(mappers::map_trips(&parts.items))
                }
            },
        )
    }

    pub fn categories(&self, query: CategoryQuery) -> QueryHandle<CategoryQuery, Paged<Category>> {
        let api = self.resources.categories.clone();
        QueryHandle::new(
            CATEGORIES,
            self.cache.clone(),
            self.options(QueryOptions::category_list()),
            query,
            move |query: CategoryQuery| {
                let api = api.clone();
                async move {
                    let parts = api.get_all(&query).await?.into_parts()?;
                    let page = Paged::from_parts(
                        parts,
                        query.effective_page(),
                        query.effective_page_size(),
                    );
                    Ok::<_, ApiError>(page.map(|raw| mappers::map_category(&raw)))
                }
            },
        )
    }

    pub fn active_categories(&self) -> QueryHandle<CategoryQuery, Vec<Category>> {
        let api = self.resources.categories.clone();
        QueryHandle::new(
            ACTIVE_CATEGORIES,
            self.cache.clone(),
            self.options(QueryOptions::category_list()),
            CategoryQuery::active(),
            move |query: CategoryQuery| {
                let api = api.clone();
                async move {
                    let parts = api.get_all(&query).await?.into_parts()?;
                    Ok::<_, ApiError>(mappers::map_categories(&parts.items))
                }
            },
        )
    }

    pub fn category(&self, id: u64) -> QueryHandle<u64, Category> {
        let api = self.resources.categories.clone();
        QueryHandle::with_enabled(
            CATEGORY,
            self.cache.clone(),
            self.options(QueryOptions::detail()),
            id,
            valid_id,
            move |id| {
                let api = api.clone();
                async move {
                    let raw = api.get_by_id(id).await?.into_data()?;
                    Ok::<_, ApiError>(mappers::map_category(&raw))
                }
            },
        )
    }

    pub fn my_bookings(
        &self,
        query: MyBookingsQuery,
    ) -> QueryHandle<MyBookingsQuery, Paged<Booking>> {
        let api = self.resources.bookings.clone();
        QueryHandle::new(
            MY_BOOKINGS,
            self.cache.clone(),
            self.options(QueryOptions::bookings()),
            query,
            move |query: MyBookingsQuery| {
                let api = api.clone();
                async move {
                    let parts = api.get_my_bookings(&query).await?.into_parts()?;
                    let page = Paged::from_parts(parts, query.page, query.page_size);
                    Ok::<_, ApiError>(page.map(|raw| mappers::map_booking(&raw)))
                }
            },
        )
    }

    pub fn booking(&self, id: u64) -> QueryHandle<u64, Booking> {
        let api = self.resources.bookings.clone();
        QueryHandle::with_enabled(
            BOOKING,
            self.cache.clone(),
            self.options(QueryOptions::detail()),
            id,
            valid_id,
            move |id| {
                let api = api.clone();
                async move {
                    let raw = api.get_by_id(id).await?.into_data()?;
                    Ok::<_, ApiError>(mappers::map_booking(&raw))
                }
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub detail: Option<Value>,
    pub error: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl HealthStatus {
    fn from_result(result: Result<Value, ApiError>) -> Self {
        let checked_at = chrono::Utc::now();
        match result {
            Ok(detail) => {
                // Health endpoints answer `{"status":"Healthy"}`; anything else reachable counts as up
                let healthy = detail
                    .get("status")
                    .and_then(Value::as_str)
                    .map_or(true, |s| s.eq_ignore_ascii_case("healthy"));
                Self {
                    healthy,
                    detail: Some(detail),
                    error: None,
                    checked_at,
                }
            }
            Err(e) => Self {
                healthy: false,
                detail: None,
                error: Some(e.to_string()),
                checked_at,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub api: HealthStatus,
    pub database: HealthStatus,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.api.healthy && self.database.healthy
    }
}

/// Connectivity check against the API host and its database.
#[derive(Clone)]
pub struct HealthProbe {
    resources: Resources,
}

impl HealthProbe {
    pub fn new(resources: Resources) -> Self {
        Self { resources }
    }

    pub async fn check(&self) -> HealthReport {
        let health = &self.resources.health;
        let (api, database) = futures::join!(health.check_api(), health.check_database());
        let report = HealthReport {
            api: HealthStatus::from_result(api),
            database: HealthStatus::from_result(database),
        };
        debug!(
            api = report.api.healthy,
            database = report.database.healthy,
            "health check finished"
        );
        report
    }
}
