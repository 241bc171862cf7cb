//! Revoked-token registry.
//!
//! Revocation is best-effort by design: a missing entry means "not revoked",
//! and a store failure degrades to "unknown" so that authentication keeps
//! working while the store is down. Callers are expected to treat `Unknown`
//! as `No` and count the degraded decision.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::backend::KvBackend;

fn blacklist_key(jti: &str) -> String {
    format!("blacklist:jti:{jti}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Yes,
    No,
    /// The store could not answer; fail open.
    Unknown,
}

#[derive(Clone)]
pub struct Blacklist {
    store: Arc<dyn KvBackend>,
}

impl Blacklist {
    #[must_use]
    pub fn new(store: Arc<dyn KvBackend>) -> Self {
        Self { store }
    }

    /// Record a token identifier until its natural expiry.
    ///
    /// A token that is already expired needs no entry; revoking it is a
    /// no-op. Revoking the same identifier twice is equivalent to once.
    ///
    /// # Errors
    ///
    /// Returns the store error; logout surfaces it since a failed revocation
    /// leaves the token usable.
    pub async fn revoke(&self, jti: &str, expires_at: i64, now: i64) -> Result<(), super::KvError> {
        let remaining = expires_at - now;
        if remaining <= 0 {
            return Ok(());
        }
        self.store
            .set_with_ttl(
                &blacklist_key(jti),
                "1",
                Duration::from_secs(remaining.unsigned_abs()),
            )
            .await
    }

    /// Check whether a token identifier has been revoked.
    pub async fn is_revoked(&self, jti: &str) -> Revocation {
        match self.store.exists(&blacklist_key(jti)).await {
            Ok(true) => Revocation::Yes,
            Ok(false) => Revocation::No,
            Err(err) => {
                warn!("blacklist lookup failed, failing open: {err}");
                Revocation::Unknown
            }
        }
    }

    /// Drop an entry. Test harness only.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn remove(&self, jti: &str) -> Result<(), super::KvError> {
        self.store.delete(&blacklist_key(jti)).await
    }
}
