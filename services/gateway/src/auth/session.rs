//! The session orchestrator.
//!
//! One entry point per authentication path (password, magic link, federated
//! completion), all converging on the same outcome: an authenticated subject
//! plus a signed access/refresh pair. Only the password path consults the
//! rate limiter.

use anyhow::{Context, Result, anyhow};
use bearer_token::{Subject, TokenPair, TokenSigner, peek_access_claims};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::magic_link::{self, LinkDisposition};
use super::password::{normalize_email, verify_digest};
use crate::directory::{RoleRecord, User, repo};
use crate::metrics::{GatewayMetrics, LoginStatus};
use crate::store::{Admission, Blacklist, LimiterKey, RateLimiter};

/// A successful authentication, however it was reached.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: TokenPair,
    pub user: User,
    pub role: RoleRecord,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("too many failed attempts")]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum MagicLinkError {
    #[error("invalid login token")]
    InvalidToken,
    #[error("login token expired")]
    Expired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    signer: Arc<TokenSigner>,
    blacklist: Blacklist,
    limiter: RateLimiter,
    metrics: Arc<GatewayMetrics>,
}

impl SessionService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        signer: Arc<TokenSigner>,
        blacklist: Blacklist,
        limiter: RateLimiter,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            pool,
            signer,
            blacklist,
            limiter,
            metrics,
        }
    }

    /// Email/password authentication with rate-limit admission.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for unknown subjects and bad passwords alike;
    /// `RateLimited` when the limiter denies admission.
    pub async fn login_password(
        &self,
        email: &str,
        password: &str,
        client_addr: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let email = normalize_email(email);
        let key = LimiterKey::new(client_addr, email.clone());

        match self.limiter.check(&key).await {
            Ok(Admission::Locked { retry_after } | Admission::JustLocked { retry_after }) => {
                self.metrics.record_rate_limit_hit();
                self.metrics.record_login(LoginStatus::Blocked);
                return Err(LoginError::RateLimited { retry_after });
            }
            Ok(Admission::Ok { .. }) => {}
            Err(err) => {
                // Fail open: the store being down must not block logins.
                warn!("rate limiter unavailable, admitting attempt: {err}");
                self.metrics.record_store_degraded();
            }
        }

        let Some(user) = repo::find_user_by_email(&self.pool, &email)
            .await
            .map_err(LoginError::Internal)?
        else {
            self.record_failure(&key, &email, client_addr).await;
            return Err(LoginError::InvalidCredentials);
        };

        // bcrypt is deliberately slow; keep it off the async workers.
        let digest = user.password_digest.clone();
        let candidate = password.to_string();
        let verified = tokio::task::spawn_blocking(move || verify_digest(&candidate, &digest))
            .await
            .context("password verification task failed")?;
        if !verified {
            self.record_failure(&key, &email, client_addr).await;
            return Err(LoginError::InvalidCredentials);
        }

        self.record_success(&key, &email, client_addr).await;
        let outcome = self.issue_for(user).await?;
        info!(user_id = outcome.user.id, "password login succeeded");
        Ok(outcome)
    }

    /// Magic-link authentication. No rate-limit admission; the secret is
    /// unguessable and single-use.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for unknown secrets, `Expired` for stale single-use
    /// secrets.
    pub async fn login_magic_link(&self, secret: &str) -> Result<LoginOutcome, MagicLinkError> {
        let Some(token) = repo::find_login_token(&self.pool, secret)
            .await
            .map_err(MagicLinkError::Internal)?
        else {
            return Err(MagicLinkError::InvalidToken);
        };

        match magic_link::evaluate(&token, Utc::now()) {
            LinkDisposition::Expired => {
                // Stale secrets are dead either way; reclaim the row.
                if let Err(err) = repo::delete_login_token(&self.pool, token.id).await {
                    warn!("failed to delete expired login token: {err}");
                }
                return Err(MagicLinkError::Expired);
            }
            LinkDisposition::ConsumeAndAccept => {
                // Single use: the deletion must land before the token pair
                // is issued.
                repo::delete_login_token(&self.pool, token.id)
                    .await
                    .map_err(MagicLinkError::Internal)?;
            }
            LinkDisposition::Accept => {}
        }

        let Some(user) = repo::find_user_by_id(&self.pool, token.user_id)
            .await
            .map_err(MagicLinkError::Internal)?
        else {
            return Err(MagicLinkError::InvalidToken);
        };

        let outcome = self.issue_for(user).await.map_err(|err| match err {
            LoginError::Internal(err) => MagicLinkError::Internal(err),
            other => MagicLinkError::Internal(anyhow!("{other}")),
        })?;
        self.metrics.record_login(LoginStatus::Success);
        info!(user_id = outcome.user.id, "magic-link login succeeded");
        Ok(outcome)
    }

    /// Finish a federated flow for a subject the linking policy resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the role record is missing or signing fails.
    pub async fn complete_federated(&self, user: User, role: RoleRecord) -> Result<LoginOutcome> {
        self.touch_last_logged_on(user.id).await;
        self.issue_pair(user, role)
    }

    /// Load the subject and role record behind validated claims.
    ///
    /// # Errors
    ///
    /// Returns an error on directory failure.
    pub async fn current_user(&self, user_id: i64) -> Result<Option<(User, RoleRecord)>> {
        let Some(user) = repo::find_user_by_id(&self.pool, user_id).await? else {
            return Ok(None);
        };
        let Some(role) = repo::find_role(&self.pool, user.meta_type, user.meta_id).await? else {
            return Ok(None);
        };
        Ok(Some((user, role)))
    }

    /// Revoke an access token. Idempotent: invalid tokens are silent
    /// successes, a token that cannot be parsed cannot be replayed through
    /// the validator either.
    ///
    /// # Errors
    ///
    /// Returns an error when the blacklist write fails; the token would
    /// remain usable otherwise.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let Ok(claims) = peek_access_claims(token) else {
            return Ok(());
        };
        self.blacklist
            .revoke(&claims.jti, claims.exp, Utc::now().timestamp())
            .await
            .map_err(|err| anyhow!("failed to blacklist token: {err}"))
    }

    async fn issue_for(&self, user: User) -> Result<LoginOutcome, LoginError> {
        self.touch_last_logged_on(user.id).await;
        let role = repo::find_role(&self.pool, user.meta_type, user.meta_id)
            .await
            .map_err(LoginError::Internal)?
            .ok_or_else(|| {
                LoginError::Internal(anyhow!(
                    "subject {} has no {} record {}",
                    user.id,
                    user.meta_type,
                    user.meta_id
                ))
            })?;
        self.issue_pair(user, role).map_err(LoginError::Internal)
    }

    fn issue_pair(&self, user: User, role: RoleRecord) -> Result<LoginOutcome> {
        let subject = Subject {
            user_id: user.id,
            boddle_uid: user.boddle_uid.clone().unwrap_or_default(),
            email: user.email.clone(),
            name: role.full_name(),
            meta_type: user.meta_type.as_str().to_string(),
            meta_id: user.meta_id,
        };
        let token = self
            .signer
            .issue_pair(&subject, Utc::now().timestamp())
            .context("failed to sign token pair")?;
        Ok(LoginOutcome { token, user, role })
    }

    /// `last_logged_on` is advisory; failures are logged and swallowed.
    async fn touch_last_logged_on(&self, user_id: i64) {
        if let Err(err) = repo::update_last_logged_on(&self.pool, user_id).await {
            warn!(user_id, "failed to update last_logged_on: {err}");
        }
    }

    async fn record_failure(&self, key: &LimiterKey, email: &str, client_addr: &str) {
        self.metrics.record_login(LoginStatus::Failure);
        if let Err(err) = repo::record_login_attempt(&self.pool, email, client_addr, false).await {
            warn!("failed to record login attempt: {err}");
        }
        if let Err(err) = self.limiter.record_failure(key).await {
            warn!("failed to record rate-limit failure: {err}");
            self.metrics.record_store_degraded();
        }
    }

    async fn record_success(&self, key: &LimiterKey, email: &str, client_addr: &str) {
        self.metrics.record_login(LoginStatus::Success);
        if let Err(err) = repo::record_login_attempt(&self.pool, email, client_addr, true).await {
            warn!("failed to record login attempt: {err}");
        }
        if let Err(err) = self.limiter.record_success(key).await {
            warn!("failed to clear rate-limit counter: {err}");
            self.metrics.record_store_degraded();
        }
    }
}
