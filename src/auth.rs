// Sign-in, sign-up and sign-out on top of the session store

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    hooks::{BOOKING, MY_BOOKINGS},
    models::{LoginRequest, RegisterRequest, UserProfile},
    mutations::{envelope_outcome, Outcome},
    query::QueryCache,
    resources::AuthApi,
    session::SessionStore,
};

pub const LOGIN_SUCCEEDED: &str = "تم تسجيل الدخول بنجاح";
pub const LOGIN_FAILED: &str = "فشل في تسجيل الدخول";
pub const REGISTER_SUCCEEDED: &str = "تم التسجيل بنجاح. يمكنك الآن تسجيل الدخول";
pub const REGISTER_FAILED: &str = "فشل في التسجيل";

// Queries whose data belongs to whoever is signed in
const USER_SCOPED: [&str; 2] = [MY_BOOKINGS, BOOKING];

#[derive(Clone)]
pub struct AuthService {
    api: AuthApi,
    session: Arc<SessionStore>,
    cache: QueryCache,
}

impl AuthService {
    pub fn new(api: AuthApi, session: Arc<SessionStore>, cache: QueryCache) -> Self {
        Self {
            api,
            session,
            cache,
        }
    }

    /// On success the token and the user are stored together; on any failure
    /// the session is left as it was.
    pub async fn login(&self, credentials: &LoginRequest) -> Outcome {
        let outcome = envelope_outcome(
            self.api.login(credentials).await,
            LOGIN_SUCCEEDED,
            LOGIN_FAILED,
            |auth| auth,
        );
        if !outcome.success {
            return Outcome::failed(outcome.message);
        }

        let Some(auth) = outcome.data else {
            warn!("login answered without a token");
            return Outcome::failed(LOGIN_FAILED);
        };
        if let Err(e) = self.session.establish(&auth.token, &auth.user) {
            warn!(error = %e, "could not persist session");
            return Outcome::failed(LOGIN_FAILED);
        }

        // A different user may have been signed in before
        for resource in USER_SCOPED {
            self.cache.remove(resource);
        }
        info!(user_id = auth.user.id, "signed in");
        Outcome::succeeded(outcome.message, None)
    }

    pub async fn register(&self, user: &RegisterRequest) -> Outcome {
        let outcome = envelope_outcome(
            self.api.register(user).await,
            REGISTER_SUCCEEDED,
            REGISTER_FAILED,
            |_| (),
        );
        Outcome {
            data: None,
            ..outcome
        }
    }

    pub fn logout(&self) {
        self.session.clear();
        for resource in USER_SCOPED {
            self.cache.remove(resource);
        }
        info!("signed out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session.user()
    }

    pub fn token(&self) -> Option<String> {
        self.session.token()
    }
}
