//! Federated sign-in endpoints.
//!
//! `GET /auth/{provider}` starts the flow with a 307 to the provider;
//! callbacks land on `GET /auth/{provider}/callback` for the conventional
//! providers and `POST /auth/icloud/callback` (form fields) for Apple.

use axum::extract::{Extension, Form, Path, Query};
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use tracing::{error, warn};

use super::types::{BeginQuery, CallbackParams, FederatedLoginResponse};
use crate::api::envelope::{ApiError, ErrorCode, success};
use crate::api::state::GatewayState;
use crate::oauth::{OAuthError, Provider, link};

const DEFAULT_REDIRECT: &str = "/";

#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(
        ("provider" = String, Path, description = "google, clever, classlink, or icloud"),
        ("redirect_url" = Option<String>, Query, description = "Post-login redirect target"),
    ),
    responses(
        (status = 307, description = "Redirect to the provider's authorization page"),
        (status = 400, description = "Unknown provider"),
    ),
    tag = "oauth"
)]
pub async fn begin(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(provider): Path<String>,
    Query(query): Query<BeginQuery>,
) -> Response {
    let Some(provider) = Provider::from_slug(&provider) else {
        return ApiError::invalid_request("Unknown provider").into_response();
    };
    let redirect_url = query
        .redirect_url
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_REDIRECT.to_string());

    match state.oauth.begin(provider, &redirect_url).await {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(OAuthError::UnknownProvider) => {
            ApiError::invalid_request("Provider is not configured").into_response()
        }
        Err(err) => {
            error!(provider = %provider, "failed to begin oauth flow: {err}");
            ApiError::internal().into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "google, clever, or classlink"),
        ("code" = String, Query, description = "Authorization code"),
        ("state" = String, Query, description = "State token issued at begin"),
    ),
    responses(
        (status = 200, description = "Authenticated; token pair issued", body = FederatedLoginResponse),
        (status = 400, description = "Missing code or state"),
        (status = 401, description = "BAD_STATE, NO_ACCOUNT, PROVIDER_ROLE_MISMATCH, or OAUTH_FAILED"),
        (status = 409, description = "Provider identity already linked elsewhere"),
    ),
    tag = "oauth"
)]
pub async fn callback(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(provider) = Provider::from_slug(&provider) else {
        return ApiError::invalid_request("Unknown provider").into_response();
    };
    finish(&state, provider, params).await
}

#[utoipa::path(
    post,
    path = "/auth/icloud/callback",
    request_body(content = CallbackParams, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Authenticated; token pair issued", body = FederatedLoginResponse),
        (status = 400, description = "Missing code or state"),
        (status = 401, description = "BAD_STATE, NO_ACCOUNT, PROVIDER_ROLE_MISMATCH, or OAUTH_FAILED"),
        (status = 409, description = "Provider identity already linked elsewhere"),
    ),
    tag = "oauth"
)]
pub async fn icloud_callback(
    Extension(state): Extension<Arc<GatewayState>>,
    Form(params): Form<CallbackParams>,
) -> Response {
    finish(&state, Provider::Icloud, params).await
}

/// Query-parameter variant of the Apple callback, used when testing the
/// flow from a browser without `form_post`.
pub async fn icloud_callback_query(
    Extension(state): Extension<Arc<GatewayState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    finish(&state, Provider::Icloud, params).await
}

async fn finish(state: &GatewayState, provider: Provider, params: CallbackParams) -> Response {
    let (Some(code), Some(oauth_state)) = (params.code.as_deref(), params.state.as_deref())
    else {
        return ApiError::invalid_request("Missing code or state parameter").into_response();
    };

    let (profile, redirect_url) = match state.oauth.complete(provider, code, oauth_state).await {
        Ok(result) => result,
        Err(err) => return oauth_error_response(provider, err),
    };

    let (user, role) = match link::resolve(&state.pool, provider, &profile).await {
        Ok(resolved) => resolved,
        Err(err) => return oauth_error_response(provider, err),
    };

    match state.sessions.complete_federated(user, role).await {
        Ok(outcome) => {
            state
                .metrics
                .record_login(crate::metrics::LoginStatus::Success);
            success(FederatedLoginResponse::new(outcome, redirect_url))
        }
        Err(err) => {
            error!(provider = %provider, "failed to finish federated login: {err:#}");
            ApiError::internal().into_response()
        }
    }
}

fn oauth_error_response(provider: Provider, err: OAuthError) -> Response {
    match err {
        OAuthError::BadState => {
            ApiError::unauthorized(ErrorCode::BadState, "Invalid or expired state token")
                .into_response()
        }
        OAuthError::NoAccount => ApiError::unauthorized(
            ErrorCode::NoAccount,
            "No account found for this identity. Please sign up first.",
        )
        .into_response(),
        OAuthError::RoleMismatch { provider, meta_type } => ApiError::unauthorized(
            ErrorCode::ProviderRoleMismatch,
            format!("{provider} sign-in is not available for {meta_type} accounts"),
        )
        .into_response(),
        OAuthError::Conflict => ApiError::new(
            axum::http::StatusCode::CONFLICT,
            ErrorCode::OauthFailed,
            "This provider identity is already linked to another account",
        )
        .into_response(),
        OAuthError::UnknownProvider => {
            ApiError::invalid_request("Provider is not configured").into_response()
        }
        OAuthError::Provider(detail) => {
            // Provider detail is logged, never surfaced.
            warn!(provider = %provider, "provider exchange failed: {detail:#}");
            ApiError::unauthorized(ErrorCode::OauthFailed, "Sign-in with the provider failed")
                .into_response()
        }
        OAuthError::Internal(detail) => {
            error!(provider = %provider, "federated login failed: {detail:#}");
            ApiError::internal().into_response()
        }
    }
}
