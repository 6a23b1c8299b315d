// Client core of the trip booking storefront: REST access, view-model
// mapping, cached queries and the signed-in session

pub mod auth;
pub mod config;
pub mod error;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod mappers;
pub mod mock_server;
pub mod models;
pub mod mutations;
pub mod query;
pub mod resources;
pub mod session;
pub mod storage;

use std::sync::Arc;

// Re-export key types for convenience
pub use auth::AuthService;
pub use config::{ClientConfig, Mode, RetryConfig};
pub use error::{ApiError, ClientError};
pub use hooks::{HealthProbe, HealthReport, Paged, QueryHandle, QueryState, QueryStatus, StorefrontQueries};
pub use http::{HttpClient, Navigator, Transport};
pub use mappers::{Booking, BookingStatus, Category, Trip, TripStatus};
pub use mutations::{BookingMutations, ContactMutations, Outcome};
pub use query::{CacheStats, QueryCache, QueryKey, QueryOptions};
pub use resources::{CategoryQuery, MyBookingsQuery, Resources, TripQuery};
pub use session::SessionStore;
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};

/// Everything a storefront UI needs, wired over one adapter, one session and
/// one query cache.
#[derive(Clone)]
pub struct Storefront {
    pub resources: Resources,
    pub queries: StorefrontQueries,
    pub bookings: BookingMutations,
    pub contact: ContactMutations,
    pub auth: AuthService,
    pub health: HealthProbe,
    session: Arc<SessionStore>,
    cache: QueryCache,
}

impl Storefront {
    /// Production wiring over reqwest.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(http::ReqwestTransport::new(config.timeout())?);
        Ok(Self::with_transport(config, transport, storage, navigator))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(storage));
        let retry = config.retry_config.clone();
        let http = Arc::new(HttpClient::new(config, transport, session.clone(), navigator));
        let resources = Resources::new(http);
        let cache = QueryCache::new();

        Self {
            queries: StorefrontQueries::new(cache.clone(), resources.clone()).with_retry(retry),
            bookings: BookingMutations::new(resources.bookings.clone(), cache.clone()),
            contact: ContactMutations::new(resources.contact.clone()),
            auth: AuthService::new(resources.auth.clone(), session.clone(), cache.clone()),
            health: HealthProbe::new(resources.clone()),
            resources,
            session,
            cache,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}
