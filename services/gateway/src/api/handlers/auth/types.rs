//! Request/response types for the auth endpoints.

use bearer_token::TokenPair;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::LoginOutcome;
use crate::directory::{RoleRecord, User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(value_type = Object)]
    pub token: TokenPair,
    pub user: User,
    #[schema(value_type = Object)]
    pub meta: RoleRecord,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            token: outcome.token,
            user: outcome.user,
            meta: outcome.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FederatedLoginResponse {
    #[schema(value_type = Object)]
    pub token: TokenPair,
    pub user: User,
    #[schema(value_type = Object)]
    pub meta: RoleRecord,
    pub redirect_url: String,
}

impl FederatedLoginResponse {
    #[must_use]
    pub fn new(outcome: LoginOutcome, redirect_url: String) -> Self {
        Self {
            token: outcome.token,
            user: outcome.user,
            meta: outcome.role,
            redirect_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    #[schema(value_type = Object)]
    pub meta: RoleRecord,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MagicLinkQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BeginQuery {
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}
