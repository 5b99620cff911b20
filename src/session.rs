//! Explicit auth session context.
//!
//! Holds the bearer token and the signed-in user. It is passed by reference
//! to [`crate::ApiClient`] and [`crate::RoomHandle::open`] instead of living
//! in ambient global state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
}

/// Body returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    credentials: Option<Credentials>,
}

impl Session {
    /// A session with no credentials loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load credentials, replacing any previous ones.
    pub fn init(&mut self, credentials: Credentials) {
        tracing::info!(user = %credentials.user.username, "session initialized");
        self.credentials = Some(credentials);
    }

    /// Forget the credentials. Safe to call when already signed out.
    pub fn teardown(&mut self) {
        if let Some(credentials) = self.credentials.take() {
            tracing::info!(user = %credentials.user.username, "session torn down");
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .map(|c| c.token.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}
