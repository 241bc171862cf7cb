//! In-memory reference implementation of [`KvBackend`].
//!
//! Mirrors the redis semantics the gateway relies on (lazy expiry, atomic
//! increment, fetch-and-delete) behind a single mutex. Used by the test
//! suite and handy for local development without a store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::backend::{KvBackend, KvError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, KvError> {
        self.entries
            .lock()
            .map_err(|_| KvError::Operation("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl KvBackend for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn fetch_and_delete(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        match entries.remove(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        let next = match entries.get(key) {
            Some(entry) => entry
                .value
                .parse::<i64>()
                .map_err(|_| KvError::Operation("counter is not an integer".to_string()))?
                + 1,
            None => 1,
        };
        let expires_at = entries.get(key).and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut entries = self.lock()?;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() -> Result<(), KvError> {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await?;
        assert_eq!(store.get("k").await?, Some("v".to_string()));
        assert!(store.exists("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_are_gone() -> Result<(), KvError> {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_millis(1))
            .await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get("k").await?, None);
        assert!(!store.exists("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn increment_starts_at_one() -> Result<(), KvError> {
        let store = MemoryStore::new();
        assert_eq!(store.increment("n").await?, 1);
        assert_eq!(store.increment("n").await?, 2);
        assert_eq!(store.increment("n").await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_and_delete_is_single_use() -> Result<(), KvError> {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await?;
        assert_eq!(store.fetch_and_delete("k").await?, Some("v".to_string()));
        assert_eq!(store.fetch_and_delete("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time() -> Result<(), KvError> {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await?;
        let remaining = store.ttl("k").await?.ok_or_else(|| {
            KvError::Operation("expected a ttl".to_string())
        })?;
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));
        assert_eq!(store.ttl("missing").await?, None);
        Ok(())
    }
}
