//! The authenticated-subject endpoint, backed by the validator contract.

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

use super::types::MeResponse;
use crate::api::envelope::{ApiError, ErrorCode, success};
use crate::api::state::GatewayState;
use crate::auth::{ValidateError, extract_bearer};

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated subject and role record", body = MeResponse),
        (status = 401, description = "Missing, invalid, expired, or revoked token"),
    ),
    tag = "auth"
)]
pub async fn me(Extension(state): Extension<Arc<GatewayState>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_bearer(&headers) else {
        // Dual-mode: without a bearer token the legacy collaborator may
        // still recognize the session. With the flag off, absence of a
        // token is itself unauthorized.
        if state.config.legacy_fallback()
            && let Some(subject) = state.legacy.authenticate(&headers).await
        {
            return respond_with_subject(&state, subject.user_id).await;
        }
        return ApiError::unauthorized(ErrorCode::Unauthorized, "Not authenticated")
            .into_response();
    };

    match state.validator.validate(&token).await {
        Ok(claims) => respond_with_subject(&state, claims.user_id).await,
        Err(ValidateError::Expired) => {
            ApiError::unauthorized(ErrorCode::TokenExpired, "Token expired").into_response()
        }
        Err(ValidateError::Revoked) => {
            ApiError::unauthorized(ErrorCode::TokenRevoked, "Token revoked").into_response()
        }
        Err(ValidateError::InvalidToken) => {
            ApiError::unauthorized(ErrorCode::InvalidToken, "Invalid token").into_response()
        }
        Err(ValidateError::Unauthorized) => {
            ApiError::unauthorized(ErrorCode::Unauthorized, "Not authenticated").into_response()
        }
        Err(ValidateError::Internal(err)) => {
            error!("token validation failed: {err:#}");
            ApiError::internal().into_response()
        }
    }
}

async fn respond_with_subject(state: &GatewayState, user_id: i64) -> Response {
    match state.sessions.current_user(user_id).await {
        Ok(Some((user, role))) => success(MeResponse { user, meta: role }),
        Ok(None) => {
            ApiError::unauthorized(ErrorCode::Unauthorized, "Account no longer exists")
                .into_response()
        }
        Err(err) => {
            error!("failed to load current user: {err:#}");
            ApiError::internal().into_response()
        }
    }
}
