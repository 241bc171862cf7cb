//! The uniform response envelope.
//!
//! Every response is `{"success": true, "data": ...}` or
//! `{"success": false, "error": {"code": ..., "message": ...}}` with a
//! stable error code. Provider and store detail never leaks into the
//! message; it is logged where the failure happened.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

/// Stable error codes used in envelopes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCredentials,
    RateLimited,
    Unauthorized,
    InvalidToken,
    TokenExpired,
    TokenRevoked,
    BadState,
    OauthFailed,
    NoAccount,
    ProviderRoleMismatch,
    ValidationFailed,
    InvalidRequest,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::BadState => "BAD_STATE",
            Self::OauthFailed => "OAUTH_FAILED",
            Self::NoAccount => "NO_ACCOUNT",
            Self::ProviderRoleMismatch => "PROVIDER_ROLE_MISMATCH",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// An error envelope with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
    retry_after_seconds: Option<u64>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    #[must_use]
    pub fn unauthorized(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationFailed, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest, message)
    }

    /// Last-resort error; detail belongs in the log, not the envelope.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Internal server error",
        )
    }

    #[must_use]
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.code.as_str(),
            "message": self.message,
        });
        if let (Some(seconds), Some(map)) = (self.retry_after_seconds, error.as_object_mut()) {
            map.insert("retry_after_seconds".to_string(), json!(seconds));
        }
        let body = json!({
            "success": false,
            "error": error,
        });
        (self.status, Json(body)).into_response()
    }
}

/// `200 OK` success envelope.
pub fn success<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": data,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::InvalidCredentials.as_str(), "INVALID_CREDENTIALS");
        assert_eq!(ErrorCode::RateLimited.as_str(), "RATE_LIMITED");
        assert_eq!(ErrorCode::TokenRevoked.as_str(), "TOKEN_REVOKED");
        assert_eq!(ErrorCode::BadState.as_str(), "BAD_STATE");
        assert_eq!(ErrorCode::NoAccount.as_str(), "NO_ACCOUNT");
        assert_eq!(
            ErrorCode::ProviderRoleMismatch.as_str(),
            "PROVIDER_ROLE_MISMATCH"
        );
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let response = ApiError::unauthorized(ErrorCode::InvalidToken, "Invalid token")
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("INVALID_TOKEN"));
        assert_eq!(body["error"]["message"], json!("Invalid token"));
        assert!(body["error"].get("retry_after_seconds").is_none());
    }

    #[tokio::test]
    async fn rate_limit_envelope_carries_retry_after() {
        let response = ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimited,
            "Too many failed attempts",
        )
        .with_retry_after(900)
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["error"]["retry_after_seconds"], json!(900));
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let response = success(json!({"status": "healthy"}));
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["status"], json!("healthy"));
    }
}
