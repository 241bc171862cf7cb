//! Claim sets carried by the gateway's signed tokens.

use serde::{Deserialize, Serialize};

/// Issuer stamped into every token minted by the gateway.
pub const ISSUER: &str = "boddle-auth-gateway";

/// Claims carried by an access token.
///
/// The custom claims mirror the subject row in the user directory so that
/// downstream services can authorize without a directory read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: i64,
    pub boddle_uid: String,
    pub email: String,
    pub name: String,
    pub meta_type: String,
    pub meta_id: i64,
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

/// Claims carried by a refresh token. Registered claims only; the subject
/// identifier is enough to mint a fresh access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

/// Subject fields the orchestrator feeds into token issuance.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: i64,
    pub boddle_uid: String,
    pub email: String,
    pub name: String,
    pub meta_type: String,
    pub meta_id: i64,
}

/// An issued access/refresh pair, serialized into login responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub token_type: String,
}

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Fresh 128-bit token identifier, hex encoded.
#[must_use]
pub fn new_jti() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
