//! The validator contract for bearer tokens.
//!
//! This is the verification procedure every downstream application server
//! performs; the gateway's own `/auth/me` route runs the same code. Order
//! matters: algorithm and signature first, then the validity window, then
//! the revocation check, then the optional directory cross-check.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use bearer_token::{AccessClaims, Error as TokenError, TokenSigner};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::directory::repo;
use crate::metrics::{GatewayMetrics, ValidationStatus};
use crate::store::{Blacklist, Revocation};

/// Permitted clock skew between the issuer and a validator.
pub const CLOCK_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct TokenValidator {
    signer: Arc<TokenSigner>,
    blacklist: Blacklist,
    metrics: Arc<GatewayMetrics>,
    /// When present, the token's `boddle_uid` is cross-checked against the
    /// directory; a mismatch means the token outlived an account rotation.
    directory: Option<PgPool>,
}

impl TokenValidator {
    #[must_use]
    pub fn new(
        signer: Arc<TokenSigner>,
        blacklist: Blacklist,
        metrics: Arc<GatewayMetrics>,
        directory: Option<PgPool>,
    ) -> Self {
        Self {
            signer,
            blacklist,
            metrics,
            directory,
        }
    }

    /// Validate a bearer token string and return its claims.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for malformed tokens, wrong algorithms, and bad
    /// signatures; `Expired` / `Revoked` for their respective states.
    pub async fn validate(&self, token: &str) -> Result<AccessClaims, ValidateError> {
        let now = Utc::now().timestamp();
        let claims = match self.signer.verify_access(token, now, CLOCK_SKEW) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                self.metrics.record_validation(ValidationStatus::Expired);
                return Err(ValidateError::Expired);
            }
            Err(err) => {
                warn!("token rejected: {err}");
                self.metrics.record_validation(ValidationStatus::Invalid);
                return Err(ValidateError::InvalidToken);
            }
        };

        match self.blacklist.is_revoked(&claims.jti).await {
            Revocation::Yes => {
                self.metrics.record_validation(ValidationStatus::Revoked);
                return Err(ValidateError::Revoked);
            }
            Revocation::No => {}
            Revocation::Unknown => {
                // Fail open, but make the degraded decision visible.
                self.metrics.record_store_degraded();
            }
        }

        if let Some(pool) = &self.directory
            && let Err(err) = self.cross_check(pool, &claims).await
        {
            self.metrics.record_validation(ValidationStatus::Invalid);
            return Err(err);
        }

        self.metrics.record_validation(ValidationStatus::Success);
        Ok(claims)
    }

    /// One directory read: the subject's stable identifier must still match.
    async fn cross_check(&self, pool: &PgPool, claims: &AccessClaims) -> Result<(), ValidateError> {
        let user = match repo::find_user_by_id(pool, claims.user_id).await {
            Ok(user) => user,
            Err(err) => {
                // The cross-check is advisory; a directory outage must not
                // take token validation down with it.
                warn!("directory cross-check skipped: {err}");
                return Ok(());
            }
        };
        match user {
            Some(user) if user.boddle_uid.as_deref() == Some(claims.boddle_uid.as_str()) => Ok(()),
            Some(_) => {
                warn!(user_id = claims.user_id, "token subject identifier mismatch");
                Err(ValidateError::InvalidToken)
            }
            None => Err(ValidateError::InvalidToken),
        }
    }
}

/// Pull the token out of an `Authorization: Bearer` header.
#[must_use]
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bearer_token::Subject;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new(
            b"access-secret".as_slice(),
            b"refresh-secret".as_slice(),
            Duration::from_secs(21_600),
            Duration::from_secs(2_592_000),
            "boddle-platform".to_string(),
        ))
    }

    fn subject() -> Subject {
        Subject {
            user_id: 123,
            boddle_uid: "uid-1".to_string(),
            email: "t@example.com".to_string(),
            name: "Ada Lovelace".to_string(),
            meta_type: "Teacher".to_string(),
            meta_id: 456,
        }
    }

    fn validator(signer: Arc<TokenSigner>) -> TokenValidator {
        TokenValidator::new(
            signer,
            Blacklist::new(Arc::new(MemoryStore::new())),
            Arc::new(GatewayMetrics::new()),
            None,
        )
    }

    #[tokio::test]
    async fn valid_token_passes() -> Result<(), ValidateError> {
        let signer = signer();
        let pair = signer
            .issue_pair(&subject(), Utc::now().timestamp())
            .map_err(|err| ValidateError::Internal(err.into()))?;
        let claims = validator(signer).validate(&pair.access_token).await?;
        assert_eq!(claims.user_id, 123);
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_expired() -> Result<(), ValidateError> {
        let signer = signer();
        let pair = signer
            .issue_pair(&subject(), Utc::now().timestamp() - 30_000)
            .map_err(|err| ValidateError::Internal(err.into()))?;
        let result = validator(signer).validate(&pair.access_token).await;
        assert!(matches!(result, Err(ValidateError::Expired)));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let result = validator(signer()).validate("not.a.token").await;
        assert!(matches!(result, Err(ValidateError::InvalidToken)));
    }

    #[tokio::test]
    async fn revoked_token_is_revoked() -> Result<(), ValidateError> {
        let signer = signer();
        let now = Utc::now().timestamp();
        let pair = signer
            .issue_pair(&subject(), now)
            .map_err(|err| ValidateError::Internal(err.into()))?;
        let claims = bearer_token::peek_access_claims(&pair.access_token)
            .map_err(|err| ValidateError::Internal(err.into()))?;

        let blacklist = Blacklist::new(Arc::new(MemoryStore::new()));
        blacklist
            .revoke(&claims.jti, claims.exp, now)
            .await
            .map_err(|err| ValidateError::Internal(anyhow::anyhow!("{err}")))?;
        let validator = TokenValidator::new(
            signer,
            blacklist,
            Arc::new(GatewayMetrics::new()),
            None,
        );

        let result = validator.validate(&pair.access_token).await;
        assert!(matches!(result, Err(ValidateError::Revoked)));
        Ok(())
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().expect("value"));
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "bearer xyz".parse().expect("value"));
        assert_eq!(extract_bearer(&headers), Some("xyz".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcg==".parse().expect("value"));
        assert_eq!(extract_bearer(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer ".parse().expect("value"));
        assert_eq!(extract_bearer(&headers), None);

        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }
}
