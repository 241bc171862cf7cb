//! Email/password login.

use axum::Json;
use axum::extract::{ConnectInfo, Extension};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use super::types::{LoginRequest, LoginResponse};
use crate::api::client_ip::client_ip;
use crate::api::envelope::{ApiError, ErrorCode, success};
use crate::api::state::GatewayState;
use crate::auth::LoginError;
use crate::auth::password::{MIN_PASSWORD_LENGTH, normalize_email, valid_email, valid_password};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; token pair issued", body = LoginResponse),
        (status = 400, description = "Malformed email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited; retry_after_seconds set"),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Response {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return ApiError::validation("Email format is invalid").into_response();
    }
    if !valid_password(&request.password) {
        return ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
        .into_response();
    }

    let client_addr = client_ip(&headers, Some(peer.ip()));
    match state
        .sessions
        .login_password(&email, &request.password, &client_addr)
        .await
    {
        Ok(outcome) => success(LoginResponse::from(outcome)),
        Err(LoginError::InvalidCredentials) => ApiError::unauthorized(
            ErrorCode::InvalidCredentials,
            "Invalid email or password",
        )
        .into_response(),
        Err(LoginError::RateLimited { retry_after }) => ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimited,
            "Too many failed attempts",
        )
        .with_retry_after(retry_after.as_secs())
        .into_response(),
        Err(LoginError::Internal(err)) => {
            error!("login failed: {err:#}");
            ApiError::internal().into_response()
        }
    }
}
