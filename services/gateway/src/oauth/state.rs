//! One-time state tokens for the authorization-code round trip.
//!
//! The state token is the CSRF defense: a 256-bit random value saved before
//! redirecting to the provider and consumed atomically when the callback
//! arrives. The stored value is the post-login redirect target.

use anyhow::{Context, Result};
use rand::{RngCore, rngs::OsRng};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{KvBackend, KvError};

pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

fn state_key(state: &str) -> String {
    format!("oauth:state:{state}")
}

/// Draw a fresh 256-bit state token, hex encoded.
///
/// # Errors
///
/// Returns an error if the system RNG fails.
pub fn generate_state() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate oauth state")?;
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(encoded, "{byte:02x}");
    }
    Ok(encoded)
}

#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn KvBackend>,
}

impl StateStore {
    #[must_use]
    pub fn new(store: Arc<dyn KvBackend>) -> Self {
        Self { store }
    }

    /// Save a state token with its post-login redirect target.
    ///
    /// # Errors
    ///
    /// Returns the store error; without a saved state the flow cannot
    /// proceed, so this failure is not swallowed.
    pub async fn save(&self, state: &str, redirect_url: &str) -> Result<(), KvError> {
        self.store
            .set_with_ttl(&state_key(state), redirect_url, STATE_TTL)
            .await
    }

    /// Atomically consume a state token. `None` means unknown or already
    /// used; the deletion happens whether or not the rest of the callback
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn consume(&self, state: &str) -> Result<Option<String>, KvError> {
        self.store.fetch_and_delete(&state_key(state)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn state_is_256_bit_hex() -> Result<()> {
        let state = generate_state()?;
        assert_eq!(state.len(), 64);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, generate_state()?);
        Ok(())
    }

    #[tokio::test]
    async fn state_is_single_use() -> Result<(), KvError> {
        let states = StateStore::new(Arc::new(MemoryStore::new()));
        states.save("abc", "/dashboard").await?;

        assert_eq!(states.consume("abc").await?, Some("/dashboard".to_string()));
        assert_eq!(states.consume("abc").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() -> Result<(), KvError> {
        let states = StateStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(states.consume("never-saved").await?, None);
        Ok(())
    }
}
