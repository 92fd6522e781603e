//! Types for authentication

use serde::{Deserialize, Serialize};

/// The logged-in user as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: i64,

    /// The login name
    pub username: String,
}

/// Login credentials
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// The user data
    pub user: User,

    /// The bearer token
    pub token: String,

    /// Token lifetime in seconds, informational only
    #[serde(default)]
    pub expires_in: Option<i64>,
}
