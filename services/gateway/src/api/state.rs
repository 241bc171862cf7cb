//! Shared state handed to every handler.
//!
//! Constructed once at startup and passed by `Arc`; no process-wide
//! singletons.

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{LegacyAuthenticator, SessionService, TokenValidator};
use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::oauth::OAuthEngine;

pub struct GatewayState {
    pub config: GatewayConfig,
    pub sessions: SessionService,
    pub oauth: OAuthEngine,
    pub validator: TokenValidator,
    pub legacy: Arc<dyn LegacyAuthenticator>,
    pub metrics: Arc<GatewayMetrics>,
    pub pool: PgPool,
}
