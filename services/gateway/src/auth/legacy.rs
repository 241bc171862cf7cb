//! Legacy session fallback contract (dual-mode deployments).
//!
//! During migration the validator may, when no bearer token is present, fall
//! through to the platform's legacy cookie-based session mechanism. That
//! mechanism is not part of the gateway; this trait is its named contract.
//! The shipped implementation always declines.

use async_trait::async_trait;
use axum::http::HeaderMap;

/// A subject authenticated by the legacy mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySubject {
    pub user_id: i64,
}

#[async_trait]
pub trait LegacyAuthenticator: Send + Sync {
    /// Inspect the request headers (cookies) and resolve a subject, if the
    /// legacy session is valid. `None` means the fallback declined.
    async fn authenticate(&self, headers: &HeaderMap) -> Option<LegacySubject>;
}

/// Default collaborator: no legacy sessions are ever honored.
#[derive(Debug, Clone, Default)]
pub struct NoopLegacyAuthenticator;

#[async_trait]
impl LegacyAuthenticator for NoopLegacyAuthenticator {
    async fn authenticate(&self, _headers: &HeaderMap) -> Option<LegacySubject> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_always_declines() {
        let legacy = NoopLegacyAuthenticator;
        let headers = HeaderMap::new();
        assert_eq!(legacy.authenticate(&headers).await, None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "legacy_session=abc".parse().expect("header value"),
        );
        assert_eq!(legacy.authenticate(&headers).await, None);
    }
}
