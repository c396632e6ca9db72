//! Caller identity for incoming WebSocket upgrades.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Resolves a bearer token to the user id that owns it.
#[cfg_attr(test, mockall::automock)]
pub trait Authenticator: Send + Sync {
    /// Return the user id for `token`, or `None` if the token is unknown.
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Authenticator backed by a fixed token table.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenAuthenticator {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenAuthenticator {
    /// Create from a token → user id table.
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Add or replace one token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        let _ = self.tokens.insert(token.into(), user_id.into());
        self
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Pull the token from `Authorization: Bearer <token>`, falling back to the
/// `token` query parameter.
pub fn extract_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    from_header.or_else(|| query_token.filter(|t| !t.is_empty()))
}
