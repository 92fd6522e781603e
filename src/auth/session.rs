//! Session state and its persisted form

use serde::{Deserialize, Serialize};

use super::types::User;

/// In-memory session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// The logged-in user
    #[serde(default)]
    pub user: Option<User>,

    /// The bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Whether the token is present and unexpired
    #[serde(rename = "isAuthenticated", default)]
    pub is_authenticated: bool,
}

impl SessionState {
    /// State right after a successful login
    pub fn authenticated(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
        }
    }
}

/// The envelope written to durable storage: `{"state":{...},"version":0}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    pub state: SessionState,
    #[serde(default)]
    pub version: u32,
}

impl PersistedSession {
    pub fn new(state: SessionState) -> Self {
        Self { state, version: 0 }
    }
}
