//! Account/credential lookup contract.
//!
//! The engine core never authenticates. Plugins consult an [`AuthProvider`]
//! when a transfer surfaces an HTTP 401/403-class failure and decide
//! themselves whether to retry with credentials or fail.

use async_trait::async_trait;
use std::collections::HashMap;

/// Stored credentials for one host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Password
    pub password: String,
}

/// Credential lookup by host
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return stored credentials for `host`, if any
    async fn credentials(&self, host: &str) -> Option<Credentials>;
}

/// Provider with no stored accounts
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn credentials(&self, _host: &str) -> Option<Credentials> {
        None
    }
}

/// In-memory provider with a fixed host → credentials map
#[derive(Default)]
pub struct StaticAuthProvider {
    entries: HashMap<String, Credentials>,
}

impl StaticAuthProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for a host
    pub fn insert(&mut self, host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) {
        self.entries.insert(
            host.into(),
            Credentials {
                username: username.into(),
                password: password.into(),
            },
        );
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn credentials(&self, host: &str) -> Option<Credentials> {
        self.entries.get(host).cloned()
    }
}
