//! The server action: build the start-of-day state and run the boundary.

use anyhow::{Context, Result, anyhow};
use bearer_token::{AssertionSigner, TokenSigner};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::{self, GatewayState};
use crate::auth::{NoopLegacyAuthenticator, SessionService, TokenValidator};
use crate::config::{GatewayConfig, parse_allowed_origins};
use crate::metrics::GatewayMetrics;
use crate::oauth::{OAuthEngine, ProviderConfig, StateStore};
use crate::store::{Blacklist, KvBackend, RateLimiter, RedisStore};

const DIRECTORY_MAX_CONNECTIONS: u32 = 25;

#[derive(Debug)]
pub struct OAuthClientArgs {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_url: String,
}

#[derive(Debug)]
pub struct IcloudArgs {
    pub service_id: String,
    pub team_id: String,
    pub key_id: String,
    pub private_key_path: String,
    pub redirect_url: String,
}

pub struct Args {
    pub port: u16,
    pub env: String,
    pub database_url: String,
    pub redis_url: String,
    pub cors_allowed_origins: String,
    pub jwt_secret_key: SecretString,
    pub jwt_refresh_secret_key: SecretString,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub audience: String,
    pub google: Option<OAuthClientArgs>,
    pub clever: Option<OAuthClientArgs>,
    pub classlink: Option<OAuthClientArgs>,
    pub icloud: Option<IcloudArgs>,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_attempts: i64,
    pub rate_limit_lockout_seconds: u64,
    pub legacy_fallback: bool,
    pub verify_directory_uid: bool,
}

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if the directory or the key-value store is unreachable,
/// the Apple signing key cannot be loaded, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let provider_configs = provider_configs(&args)?;

    let config = GatewayConfig::new()
        .with_port(args.port)
        .with_env(args.env)
        .with_cors_allowed_origins(parse_allowed_origins(&args.cors_allowed_origins))
        .with_audience(args.audience)
        .with_access_token_ttl(Duration::from_secs(args.access_token_ttl_seconds))
        .with_refresh_token_ttl(Duration::from_secs(args.refresh_token_ttl_seconds))
        .with_rate_limit_window(Duration::from_secs(args.rate_limit_window_seconds))
        .with_rate_limit_max_attempts(args.rate_limit_max_attempts)
        .with_rate_limit_lockout(Duration::from_secs(args.rate_limit_lockout_seconds))
        .with_legacy_fallback(args.legacy_fallback)
        .with_verify_directory_uid(args.verify_directory_uid);

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(DIRECTORY_MAX_CONNECTIONS)
        .test_before_acquire(true)
        .connect(&args.database_url)
        .await
        .context("Failed to connect to the user directory")?;
    info!("Connected to the user directory");

    let store: Arc<dyn KvBackend> = Arc::new(
        RedisStore::connect(&args.redis_url)
            .await
            .map_err(|err| anyhow!("Failed to connect to the key-value store: {err}"))?,
    );
    info!("Connected to the key-value store");

    let signer = Arc::new(TokenSigner::new(
        args.jwt_secret_key.expose_secret().as_bytes(),
        args.jwt_refresh_secret_key.expose_secret().as_bytes(),
        config.access_token_ttl(),
        config.refresh_token_ttl(),
        config.audience().to_string(),
    ));

    let metrics = Arc::new(GatewayMetrics::new());
    let blacklist = Blacklist::new(store.clone());
    let limiter = RateLimiter::new(
        store.clone(),
        config.rate_limit_window(),
        config.rate_limit_max_attempts(),
        config.rate_limit_lockout(),
    );

    let oauth = OAuthEngine::new(provider_configs, StateStore::new(store.clone()))?;
    let configured = oauth.configured();
    if configured.is_empty() {
        warn!("no identity providers configured; federated sign-in is disabled");
    } else {
        let slugs: Vec<&str> = configured.iter().map(|p| p.slug()).collect();
        info!("identity providers mounted: {}", slugs.join(", "));
    }

    let sessions = SessionService::new(
        pool.clone(),
        signer.clone(),
        blacklist.clone(),
        limiter,
        metrics.clone(),
    );
    let validator = TokenValidator::new(
        signer,
        blacklist,
        metrics.clone(),
        config.verify_directory_uid().then(|| pool.clone()),
    );

    let state = Arc::new(GatewayState {
        config,
        sessions,
        oauth,
        validator,
        legacy: Arc::new(NoopLegacyAuthenticator),
        metrics,
        pool,
    });

    api::serve(state).await
}

fn provider_configs(args: &Args) -> Result<Vec<ProviderConfig>> {
    let mut configs = Vec::new();
    if let Some(google) = &args.google {
        configs.push(ProviderConfig::google(
            google.client_id.clone(),
            google.client_secret.clone(),
            google.redirect_url.clone(),
        ));
    }
    if let Some(clever) = &args.clever {
        configs.push(ProviderConfig::clever(
            clever.client_id.clone(),
            clever.client_secret.clone(),
            clever.redirect_url.clone(),
        ));
    }
    if let Some(classlink) = &args.classlink {
        configs.push(ProviderConfig::classlink(
            classlink.client_id.clone(),
            classlink.client_secret.clone(),
            classlink.redirect_url.clone(),
        ));
    }
    if let Some(icloud) = &args.icloud {
        let pem = fs::read_to_string(&icloud.private_key_path).with_context(|| {
            format!(
                "Failed to read Apple private key: {}",
                icloud.private_key_path
            )
        })?;
        let signer = AssertionSigner::from_pem(
            &pem,
            icloud.key_id.clone(),
            icloud.team_id.clone(),
            icloud.service_id.clone(),
        )
        .map_err(|err| anyhow!("Failed to load Apple private key: {err}"))?;
        configs.push(ProviderConfig::icloud(signer, icloud.redirect_url.clone()));
    }
    Ok(configs)
}
