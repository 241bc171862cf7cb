//! Token revocation.

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

use super::types::LogoutResponse;
use crate::api::envelope::{ApiError, ErrorCode, success};
use crate::api::state::GatewayState;
use crate::auth::extract_bearer;

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Token revoked (idempotent)", body = LogoutResponse),
        (status = 401, description = "Missing or malformed Authorization header"),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = extract_bearer(&headers) else {
        return ApiError::unauthorized(
            ErrorCode::Unauthorized,
            "Authorization header is required",
        )
        .into_response();
    };

    match state.sessions.logout(&token).await {
        Ok(()) => success(LogoutResponse {
            message: "Logged out successfully".to_string(),
        }),
        Err(err) => {
            error!("logout failed: {err:#}");
            ApiError::internal().into_response()
        }
    }
}
