//! Counter-with-expiry rate limiting for credential attempts.
//!
//! Two keys per `(client address, identity)` pair: an attempt counter that
//! lives for the attempt window, and a lockout marker with its own TTL. The
//! two never coexist; crossing the threshold replaces the counter with the
//! marker. Store failures fail open.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::backend::{KvBackend, KvError};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);

/// Rate-limit identity. Both parts participate in the key; a deployment that
/// wants address-only or email-only keying collapses the other part here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterKey {
    pub address: String,
    pub identity: String,
}

impl LimiterKey {
    #[must_use]
    pub fn new(address: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identity: identity.into(),
        }
    }

    fn counter_key(&self) -> String {
        format!("ratelimit:login:{}:{}", self.address, self.identity)
    }

    fn lockout_key(&self) -> String {
        format!("ratelimit:lockout:{}:{}", self.address, self.identity)
    }
}

/// Admission decision for one credential attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Ok { remaining: i64 },
    /// This attempt crossed the threshold and started the lockout.
    JustLocked { retry_after: Duration },
    Locked { retry_after: Duration },
}

impl Admission {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvBackend>,
    window: Duration,
    max_attempts: i64,
    lockout: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        store: Arc<dyn KvBackend>,
        window: Duration,
        max_attempts: i64,
        lockout: Duration,
    ) -> Self {
        Self {
            store,
            window,
            max_attempts,
            lockout,
        }
    }

    /// Decide whether one more credential attempt is admitted.
    ///
    /// Store failures return `Ok` with the full attempt budget; availability
    /// wins over the security margin here and the caller counts the degraded
    /// decision.
    pub async fn check(&self, key: &LimiterKey) -> Result<Admission, KvError> {
        // An existing lockout marker denies outright.
        if let Some(remaining) = self.store.ttl(&key.lockout_key()).await?
            && remaining > Duration::ZERO
        {
            return Ok(Admission::Locked {
                retry_after: remaining,
            });
        }

        let count = match self.store.get(&key.counter_key()).await? {
            Some(raw) => raw.parse::<i64>().unwrap_or(0),
            None => 0,
        };

        if count >= self.max_attempts {
            // Threshold crossed: replace the counter with the lockout marker.
            self.store
                .set_with_ttl(&key.lockout_key(), "1", self.lockout)
                .await?;
            if let Err(err) = self.store.delete(&key.counter_key()).await {
                warn!("failed to clear attempt counter after lockout: {err}");
            }
            return Ok(Admission::JustLocked {
                retry_after: self.lockout,
            });
        }

        Ok(Admission::Ok {
            remaining: self.max_attempts - count,
        })
    }

    /// Record a failed attempt. The window TTL is attached when the counter
    /// is newly created.
    ///
    /// # Errors
    ///
    /// Returns the store error; callers treat it as best-effort.
    pub async fn record_failure(&self, key: &LimiterKey) -> Result<(), KvError> {
        let count = self.store.increment(&key.counter_key()).await?;
        if count == 1 {
            self.store.expire(&key.counter_key(), self.window).await?;
        }
        Ok(())
    }

    /// Clear the attempt counter after a successful authentication. The
    /// lockout marker, if any, is left to expire on its own.
    ///
    /// # Errors
    ///
    /// Returns the store error; callers treat it as best-effort.
    pub async fn record_success(&self, key: &LimiterKey) -> Result<(), KvError> {
        self.store.delete(&key.counter_key()).await
    }

    /// Drop both keys. Admin/test helper.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn clear(&self, key: &LimiterKey) -> Result<(), KvError> {
        self.store.delete(&key.lockout_key()).await?;
        self.store.delete(&key.counter_key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryStore::new()),
            DEFAULT_WINDOW,
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_LOCKOUT,
        )
    }

    fn key() -> LimiterKey {
        LimiterKey::new("10.0.0.1", "x@y.com")
    }

    #[tokio::test]
    async fn fresh_identity_has_full_budget() -> Result<(), KvError> {
        let limiter = limiter();
        assert_eq!(
            limiter.check(&key()).await?,
            Admission::Ok {
                remaining: DEFAULT_MAX_ATTEMPTS
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn budget_shrinks_per_failure() -> Result<(), KvError> {
        let limiter = limiter();
        let key = key();
        limiter.record_failure(&key).await?;
        limiter.record_failure(&key).await?;
        assert_eq!(
            limiter.check(&key).await?,
            Admission::Ok {
                remaining: DEFAULT_MAX_ATTEMPTS - 2
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn sixth_attempt_locks_and_seventh_stays_locked() -> Result<(), KvError> {
        let limiter = limiter();
        let key = key();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            assert!(limiter.check(&key).await?.is_allowed());
            limiter.record_failure(&key).await?;
        }

        match limiter.check(&key).await? {
            Admission::JustLocked { retry_after } => assert_eq!(retry_after, DEFAULT_LOCKOUT),
            other => panic!("expected JustLocked, got {other:?}"),
        }
        match limiter.check(&key).await? {
            Admission::Locked { retry_after } => assert!(retry_after <= DEFAULT_LOCKOUT),
            other => panic!("expected Locked, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn counter_and_marker_never_coexist() -> Result<(), KvError> {
        let limiter = limiter();
        let key = key();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            limiter.record_failure(&key).await?;
        }
        let _ = limiter.check(&key).await?; // transition to locked
        assert!(!limiter.store.exists(&key.counter_key()).await?);

        // Clearing only the lockout must reveal an empty counter.
        limiter.store.delete(&key.lockout_key()).await?;
        assert_eq!(
            limiter.check(&key).await?,
            Admission::Ok {
                remaining: DEFAULT_MAX_ATTEMPTS
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn success_resets_the_counter() -> Result<(), KvError> {
        let limiter = limiter();
        let key = key();
        for _ in 0..3 {
            limiter.record_failure(&key).await?;
        }
        limiter.record_success(&key).await?;

        // Next failure behaves like the first.
        limiter.record_failure(&key).await?;
        assert_eq!(
            limiter.check(&key).await?,
            Admission::Ok {
                remaining: DEFAULT_MAX_ATTEMPTS - 1
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn distinct_identities_do_not_interfere() -> Result<(), KvError> {
        let limiter = limiter();
        let first = LimiterKey::new("10.0.0.1", "a@b.com");
        let second = LimiterKey::new("10.0.0.2", "a@b.com");
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            limiter.record_failure(&first).await?;
        }
        let _ = limiter.check(&first).await?;
        assert!(limiter.check(&second).await?.is_allowed());
        Ok(())
    }

    #[tokio::test]
    async fn window_ttl_is_attached_on_first_failure() -> Result<(), KvError> {
        let limiter = limiter();
        let key = key();
        limiter.record_failure(&key).await?;
        let ttl = limiter.store.ttl(&key.counter_key()).await?;
        assert!(ttl.is_some_and(|ttl| ttl <= DEFAULT_WINDOW));
        Ok(())
    }
}
