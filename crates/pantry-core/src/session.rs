//! Typed view of the persisted session: credentials, profile and pending login.

use std::sync::Arc;

use crate::domain::{Email, UserProfile};
use crate::storage::{KeyValueStore, StorageKey, StoreError};

/// Login that is waiting for a backend job before it can be used.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub email: Email,
    pub token: Option<String>,
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("email", &self.email)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn token(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .get(StorageKey::Token.as_str())?
            .filter(|token| !token.is_empty()))
    }

    pub fn is_authenticated(&self) -> Result<bool, StoreError> {
        Ok(self.token()?.is_some())
    }

    /// Stored profile; a corrupt value reads as absent.
    pub fn user(&self) -> Result<Option<UserProfile>, StoreError> {
        let Some(raw) = self.store.get(StorageKey::User.as_str())? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable stored user profile");
                Ok(None)
            }
        }
    }

    /// Start an authenticated session and drop any pending-login leftovers.
    pub fn set_authenticated(
        &self,
        token: &str,
        user: Option<&UserProfile>,
    ) -> Result<(), StoreError> {
        self.store.set(StorageKey::Token.as_str(), token)?;
        if let Some(user) = user {
            // UserProfile only holds JSON-representable data.
            if let Ok(serialized) = serde_json::to_string(user) {
                self.store.set(StorageKey::User.as_str(), &serialized)?;
            }
        }
        self.clear_pending_login()
    }

    pub fn set_pending_login(&self, email: &Email, token: Option<&str>) -> Result<(), StoreError> {
        self.store
            .set(StorageKey::PendingLoginEmail.as_str(), email.as_str())?;
        match token {
            Some(token) => self.store.set(StorageKey::PendingToken.as_str(), token),
            None => self.store.remove(StorageKey::PendingToken.as_str()),
        }
    }

    pub fn pending_login(&self) -> Result<Option<PendingLogin>, StoreError> {
        let Some(raw_email) = self.store.get(StorageKey::PendingLoginEmail.as_str())? else {
            return Ok(None);
        };

        let Ok(email) = Email::parse(&raw_email) else {
            tracing::warn!("ignoring unreadable pending login email");
            return Ok(None);
        };

        let token = self
            .store
            .get(StorageKey::PendingToken.as_str())?
            .filter(|token| !token.is_empty());

        Ok(Some(PendingLogin { email, token }))
    }

    /// Move a pending token into the active session. Returns false when there is
    /// nothing to promote and the user has to log in again.
    pub fn promote_pending_login(&self) -> Result<bool, StoreError> {
        let Some(PendingLogin {
            token: Some(token), ..
        }) = self.pending_login()?
        else {
            self.clear_pending_login()?;
            return Ok(false);
        };

        self.store.set(StorageKey::Token.as_str(), &token)?;
        self.clear_pending_login()?;
        Ok(true)
    }

    pub fn clear_pending_login(&self) -> Result<(), StoreError> {
        self.store.remove(StorageKey::PendingLoginEmail.as_str())?;
        self.store.remove(StorageKey::PendingToken.as_str())
    }

    /// Logout: every persisted key goes, cached resources included.
    pub fn end(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}
