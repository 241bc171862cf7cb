//! Magic-link login (`GET /auth/token?token=SECRET`).

use axum::extract::{Extension, Query};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

use super::types::{LoginResponse, MagicLinkQuery};
use crate::api::envelope::{ApiError, ErrorCode, success};
use crate::api::state::GatewayState;
use crate::auth::MagicLinkError;

#[utoipa::path(
    get,
    path = "/auth/token",
    params(("token" = String, Query, description = "Opaque login secret")),
    responses(
        (status = 200, description = "Authenticated; token pair issued", body = LoginResponse),
        (status = 400, description = "Missing token parameter"),
        (status = 401, description = "Invalid or expired login token"),
    ),
    tag = "auth"
)]
pub async fn login_with_token(
    Extension(state): Extension<Arc<GatewayState>>,
    Query(query): Query<MagicLinkQuery>,
) -> Response {
    let Some(secret) = query.token.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return ApiError::validation("token parameter is required").into_response();
    };

    match state.sessions.login_magic_link(secret).await {
        Ok(outcome) => success(LoginResponse::from(outcome)),
        Err(MagicLinkError::InvalidToken) => {
            ApiError::unauthorized(ErrorCode::InvalidToken, "Invalid or expired token")
                .into_response()
        }
        Err(MagicLinkError::Expired) => {
            ApiError::unauthorized(ErrorCode::TokenExpired, "Login token expired").into_response()
        }
        Err(MagicLinkError::Internal(err)) => {
            error!("magic-link login failed: {err:#}");
            ApiError::internal().into_response()
        }
    }
}
