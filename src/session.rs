// Process-wide session: token + user profile, mirrored in durable storage

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    error::ApiError,
    models::UserProfile,
    storage::{CredentialStorage, TOKEN_KEY, USER_KEY},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

/// Token and user always change together: both the storage write and the
/// in-memory swap happen while holding the state lock, so no reader ever sees
/// a token without its user.
pub struct SessionStore {
    storage: Arc<dyn CredentialStorage>,
    state: RwLock<Option<AuthSession>>,
}

impl SessionStore {
    /// Hydrates from storage once. Half a session (token without user, user
    /// without token, or a user record that no longer parses) counts as
    /// signed out and is wiped.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let restored = Self::hydrate(storage.as_ref());
        Self {
            storage,
            state: RwLock::new(restored),
        }
    }

    fn hydrate(storage: &dyn CredentialStorage) -> Option<AuthSession> {
        let token = storage.get(TOKEN_KEY).ok().flatten();
        let user = storage.get(USER_KEY).ok().flatten();

        let restored = match (&token, &user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                match serde_json::from_str::<UserProfile>(user) {
                    Ok(user) => Some(AuthSession {
                        token: token.clone(),
                        user,
                    }),
                    Err(e) => {
                        warn!(error = %e, "stored user profile unreadable");
                        None
                    }
                }
            }
            _ => None,
        };

        if restored.is_none() && (token.is_some() || user.is_some()) {
            warn!("inconsistent stored session, clearing credentials");
            if let Err(e) = storage.write_batch(&[(TOKEN_KEY, None), (USER_KEY, None)]) {
                warn!(error = %e, "failed to clear stored credentials");
            }
        }
        if restored.is_some() {
            debug!("session restored from storage");
        }
        restored
    }

    pub fn establish(&self, token: &str, user: &UserProfile) -> Result<(), ApiError> {
        let user_json =
            serde_json::to_string(user).map_err(|e| ApiError::Serialization(e.to_string()))?;

        let mut state = self.state.write();
        self.storage
            .write_batch(&[(TOKEN_KEY, Some(token)), (USER_KEY, Some(&user_json))])?;
        *state = Some(AuthSession {
            token: token.to_string(),
            user: user.clone(),
        });
        Ok(())
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        if let Err(e) = self
            .storage
            .write_batch(&[(TOKEN_KEY, None), (USER_KEY, None)])
        {
            warn!(error = %e, "failed to clear stored credentials");
        }
        *state = None;
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().as_ref().map(|s| s.user.clone())
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn user() -> UserProfile {
        UserProfile {
            id: 42,
            first_name: "Salma".to_string(),
            last_name: "Adel".to_string(),
            email: "salma@example.com".to_string(),
            role: "Customer".to_string(),
        }
    }

    #[test]
    fn establish_persists_both_halves() {
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());

        session.establish("jwt-1", &user()).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("jwt-1"));
        assert_eq!(session.user(), Some(user()));
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("jwt-1"));
        assert!(storage.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn clear_removes_both_halves() {
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionStore::new(storage.clone());
        session.establish("jwt-1", &user()).unwrap();

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(session.user().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn hydrates_complete_session() {
        let user_json = serde_json::to_string(&user()).unwrap();
        let storage = Arc::new(MemoryStorage::with_entries(&[
            (TOKEN_KEY, "jwt-2"),
            (USER_KEY, &user_json),
        ]));
        let session = SessionStore::new(storage);
        assert_eq!(session.current().map(|s| s.token), Some("jwt-2".to_string()));
    }

    #[test]
    fn token_without_user_is_signed_out_and_wiped() {
        let storage = Arc::new(MemoryStorage::with_entries(&[(TOKEN_KEY, "orphan")]));
        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());
        assert!(storage.is_empty());
    }

    #[test]
    fn unreadable_user_is_signed_out_and_wiped() {
        let storage = Arc::new(MemoryStorage::with_entries(&[
            (TOKEN_KEY, "jwt"),
            (USER_KEY, "not-json"),
        ]));
        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());
        assert!(storage.is_empty());
    }
}
