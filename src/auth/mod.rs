//! Session lifecycle: login, logout and token validity

mod session;
mod token;
mod types;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fetch::{self, ApiClient};
use crate::persist::SessionStorage;

pub use session::*;
pub use token::*;
pub use types::*;

/// Message used when the backend rejects a login without saying why
pub const DEFAULT_LOGIN_ERROR: &str = "Login failed";

/// Owner of the session state.
///
/// Share it behind an `Arc`; it is the only writer of the persisted session.
pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Create a logged-out store. Call [`SessionStore::restore`] to pick up a
    /// persisted session.
    pub fn new(
        api: ApiClient,
        storage: Arc<dyn SessionStorage>,
        storage_key: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            storage,
            storage_key: storage_key.to_string(),
            clock,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Log in with username and password.
    ///
    /// On success user, token and the authenticated flag are persisted and
    /// then published together.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let response = self
            .api
            .post("/api/auth/login")
            .json(&LoginRequest { username, password })?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = fetch::error_message(response)
                .await
                .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string());
            log::info!("Login rejected for '{}' ({}): {}", username, status, message);
            return Err(Error::auth(message));
        }

        let body: LoginResponse = response.json().await?;
        let state = SessionState::authenticated(body.user.clone(), body.token);
        self.persist(&state).await?;
        *self.state.write().await = state;

        log::info!("Logged in as '{}'", body.user.username);
        Ok(body.user)
    }

    /// Clear the session and persist the cleared state. Idempotent.
    pub async fn logout(&self) -> Result<()> {
        let cleared = SessionState::default();
        self.persist(&cleared).await?;
        let previous = std::mem::replace(&mut *self.state.write().await, cleared);
        if let Some(user) = previous.user {
            log::info!("Logged out '{}'", user.username);
        }
        Ok(())
    }

    /// Whether the current token is present and unexpired.
    ///
    /// Not a pure read: an expired, expiry-less or malformed token logs the
    /// session out before returning false.
    pub async fn check_auth(&self) -> bool {
        let token = match self.state.read().await.token.clone() {
            Some(token) => token,
            None => return false,
        };

        let valid = match decode_claims(&token) {
            Ok(claims) => claims.is_valid_at(self.clock.now()),
            Err(e) => {
                log::debug!("Unreadable session token: {}", e);
                false
            }
        };

        if !valid {
            log::info!("Session token invalid or expired, logging out");
            if let Err(e) = self.logout().await {
                log::warn!("Failed to persist logout: {}", e);
            }
        }
        valid
    }

    /// Reload the persisted session, recomputing the authenticated flag from
    /// the token rather than trusting the stored one.
    pub async fn restore(&self) -> Result<bool> {
        let persisted = match self.storage.get_item(&self.storage_key).await? {
            Some(raw) => serde_json::from_str::<PersistedSession>(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding corrupt persisted session: {}", e);
                PersistedSession::default()
            }),
            None => PersistedSession::default(),
        };

        let mut state = persisted.state;
        state.is_authenticated = state.token.is_some();
        *self.state.write().await = state;

        Ok(self.check_auth().await)
    }

    /// A copy of the current state
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// The in-memory authenticated flag
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    /// The logged-in user
    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// The in-memory token
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    async fn persist(&self, state: &SessionState) -> Result<()> {
        let raw = serde_json::to_string(&PersistedSession::new(state.clone()))?;
        self.storage.set_item(&self.storage_key, &raw).await
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}
