//! Key-value backend trait with TTL semantics.
//!
//! The gateway owns three key families in the store (blacklist entries,
//! rate-limit counters and lockout markers, OAuth state tokens); everything it
//! needs from the store is expressed by this trait. Backends are expected to
//! be thread-safe and to expire keys on their own.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// Typed access to an external key-value store with TTL semantics.
///
/// `increment` and `fetch_and_delete` are the two compound operations the
/// gateway relies on for correctness; implementations must make them atomic
/// (`INCR` / `GETDEL` on redis, a single mutex in the in-memory backend).
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Atomically read and remove a key. `None` when the key was absent.
    async fn fetch_and_delete(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Atomically increment a counter, creating it at 1 when absent.
    /// Returns the post-increment value.
    async fn increment(&self, key: &str) -> Result<i64, KvError>;

    /// Attach a TTL to an existing key. No-op when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Remaining TTL for a key; `None` when the key is absent or has no TTL.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError>;
}
