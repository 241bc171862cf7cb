//! The shared authorization-code engine.
//!
//! `begin` issues the state token and builds the provider's authorization
//! URL; `complete` consumes the state, exchanges the code, and normalizes the
//! profile. Everything provider-specific is data in [`ProviderConfig`].

use anyhow::{Context, Result, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::provider::{ClientAuth, Profile, ProfileSource, Provider, ProviderConfig};
use super::state::{StateStore, generate_state};
use crate::directory::MetaType;

/// Outbound budget for identity-provider calls.
const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client assertions are short-lived; five minutes covers the exchange.
const ASSERTION_TTL_SECONDS: i64 = 300;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("unknown or unconfigured provider")]
    UnknownProvider,
    #[error("invalid or expired state token")]
    BadState,
    #[error("no account found for this identity")]
    NoAccount,
    #[error("{provider} sign-in is not available for {meta_type} accounts")]
    RoleMismatch {
        provider: Provider,
        meta_type: MetaType,
    },
    #[error("provider identity is already linked to another account")]
    Conflict,
    /// Provider-side failure. Detail is logged, never surfaced to clients.
    #[error("provider exchange failed: {0}")]
    Provider(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
    #[allow(dead_code)]
    expires_in: Option<i64>,
}

pub struct OAuthEngine {
    providers: HashMap<Provider, ProviderConfig>,
    states: StateStore,
    http: reqwest::Client,
}

impl OAuthEngine {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(configs: Vec<ProviderConfig>, states: StateStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_HTTP_TIMEOUT)
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build provider HTTP client")?;
        let providers = configs
            .into_iter()
            .map(|config| (config.provider, config))
            .collect();
        Ok(Self {
            providers,
            states,
            http,
        })
    }

    #[must_use]
    pub fn configured(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.providers.keys().copied().collect();
        providers.sort_by_key(|provider| provider.slug());
        providers
    }

    /// Issue a state token and build the provider's authorization URL.
    ///
    /// # Errors
    ///
    /// Fails when the provider is not configured or the state cannot be
    /// saved; without a saved state the CSRF check cannot succeed later.
    pub async fn begin(&self, provider: Provider, redirect_url: &str) -> Result<Url, OAuthError> {
        let config = self
            .providers
            .get(&provider)
            .ok_or(OAuthError::UnknownProvider)?;

        let state = generate_state()?;
        self.states
            .save(&state, redirect_url)
            .await
            .map_err(|err| anyhow!("failed to save oauth state: {err}"))?;

        let mut url =
            Url::parse(config.auth_url).context("provider authorization URL is invalid")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &config.client_id);
            query.append_pair("redirect_uri", &config.redirect_url);
            query.append_pair("response_type", "code");
            if !config.scopes.is_empty() {
                query.append_pair("scope", &config.scopes.join(" "));
            }
            query.append_pair("state", &state);
            for (key, value) in config.extra_auth_params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Handle the provider callback: consume the state, exchange the code,
    /// and normalize the profile.
    ///
    /// Returns the profile together with the post-login redirect that was
    /// saved at `begin` time.
    ///
    /// # Errors
    ///
    /// `BadState` for unknown or reused states; provider-side failures
    /// collapse into [`OAuthError::Provider`].
    pub async fn complete(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<(Profile, String), OAuthError> {
        let config = self
            .providers
            .get(&provider)
            .ok_or(OAuthError::UnknownProvider)?;

        // The state is consumed before anything else; a reused state never
        // reaches the token endpoint.
        let redirect_url = self
            .states
            .consume(state)
            .await
            .map_err(|err| anyhow!("failed to consume oauth state: {err}"))?
            .ok_or(OAuthError::BadState)?;

        let token = self
            .exchange_code(config, code)
            .await
            .map_err(OAuthError::Provider)?;
        let profile = self
            .fetch_profile(config, &token)
            .await
            .map_err(OAuthError::Provider)?;

        debug!(
            provider = %provider,
            subject = %profile.provider_subject,
            "provider profile normalized"
        );
        Ok((profile, redirect_url))
    }

    async fn exchange_code(&self, config: &ProviderConfig, code: &str) -> Result<TokenResponse> {
        let mut params: Vec<(&str, String)> = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", config.redirect_url.clone()),
            ("client_id", config.client_id.clone()),
        ];
        match &config.client_auth {
            ClientAuth::Secret(secret) => {
                params.push(("client_secret", secret.expose_secret().to_string()));
            }
            ClientAuth::Assertion { signer, audience } => {
                let assertion = signer
                    .sign(audience, Utc::now().timestamp(), ASSERTION_TTL_SECONDS)
                    .context("failed to sign client assertion")?;
                params.push(("client_secret", assertion));
            }
        }

        let response = self
            .http
            .post(config.token_url)
            .form(&params)
            .send()
            .await
            .context("token endpoint unreachable")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token endpoint returned {status}: {body}");
        }
        response
            .json()
            .await
            .context("failed to decode token response")
    }

    async fn fetch_profile(
        &self,
        config: &ProviderConfig,
        token: &TokenResponse,
    ) -> Result<Profile> {
        match config.profile {
            ProfileSource::UserInfo(url) => {
                let access_token = token
                    .access_token
                    .as_deref()
                    .context("token response carried no access token")?;
                let document: UserInfoDocument =
                    self.fetch_json(url, access_token).await?;
                document.into_profile()
            }
            ProfileSource::CleverMe(url) => {
                let access_token = token
                    .access_token
                    .as_deref()
                    .context("token response carried no access token")?;
                let envelope: CleverEnvelope = self.fetch_json(url, access_token).await?;
                Ok(envelope.into_profile())
            }
            ProfileSource::IdToken => {
                let id_token = token
                    .id_token
                    .as_deref()
                    .context("token response carried no id token")?;
                profile_from_id_token(id_token)
            }
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .with_context(|| format!("profile endpoint unreachable: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("profile endpoint returned {status}: {body}");
        }
        response.json().await.context("failed to decode profile")
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoDocument {
    sub: Option<String>,
    id: Option<String>,
    email: Option<String>,
    verified_email: Option<bool>,
    email_verified: Option<serde_json::Value>,
    given_name: Option<String>,
    family_name: Option<String>,
}

impl UserInfoDocument {
    fn into_profile(self) -> Result<Profile> {
        let provider_subject = self
            .sub
            .or(self.id)
            .context("userinfo document carried no subject")?;
        let email_verified = self
            .verified_email
            .or_else(|| self.email_verified.as_ref().map(truthy));
        Ok(Profile {
            provider_subject,
            email: self.email.unwrap_or_default(),
            given_name: self.given_name,
            family_name: self.family_name,
            email_verified,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CleverEnvelope {
    data: CleverMe,
}

#[derive(Debug, Deserialize)]
struct CleverMe {
    id: String,
    email: Option<String>,
    #[serde(default)]
    name: CleverName,
}

#[derive(Debug, Default, Deserialize)]
struct CleverName {
    first: Option<String>,
    last: Option<String>,
}

impl CleverEnvelope {
    fn into_profile(self) -> Profile {
        Profile {
            provider_subject: self.data.id,
            email: self.data.email.unwrap_or_default(),
            given_name: self.data.name.first,
            family_name: self.data.name.last,
            // Clever accounts are provisioned and verified by districts.
            email_verified: Some(true),
        }
    }
}

/// Booleans that arrive as JSON bools or the strings "true"/"false".
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => text == "true",
        _ => false,
    }
}

/// Extract the subject claims from a provider-issued ID token.
///
/// The signature is not verified: the token was just received directly from
/// the provider's token endpoint over TLS.
// TODO: fetch and cache the provider's JWKS and verify the signature before
// trusting these claims.
fn profile_from_id_token(id_token: &str) -> Result<Profile> {
    let mut parts = id_token.split('.');
    let (Some(_), Some(claims_b64), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("id token is not a compact JWT");
    };
    let claims_json = Base64UrlUnpadded::decode_vec(claims_b64)
        .map_err(|_| anyhow!("id token payload is not base64url"))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&claims_json).context("id token payload is not json")?;

    let provider_subject = claims
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .context("id token carried no subject")?
        .to_string();
    let email = claims
        .get("email")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let email_verified = claims.get("email_verified").map(truthy);

    // Apple includes name data only on the first authorization.
    let name = claims.get("name");
    let given_name = name
        .and_then(|name| name.get("firstName"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let family_name = name
        .and_then(|name| name.get("lastName"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    Ok(Profile {
        provider_subject,
        email,
        given_name,
        family_name,
        email_verified,
    })
}
