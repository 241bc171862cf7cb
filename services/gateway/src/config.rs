//! Gateway configuration.
//!
//! Everything is environment-sourced through the CLI layer; this struct is
//! the immutable start-of-day snapshot handed to the server. Builder-style
//! `with_*` methods keep call sites readable.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_AUDIENCE: &str = "boddle-platform";
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    port: u16,
    env: String,
    cors_allowed_origins: Vec<String>,
    audience: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    rate_limit_window: Duration,
    rate_limit_max_attempts: i64,
    rate_limit_lockout: Duration,
    legacy_fallback: bool,
    verify_directory_uid: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            env: DEFAULT_ENV.to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            audience: DEFAULT_AUDIENCE.to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            rate_limit_window: crate::store::DEFAULT_WINDOW,
            rate_limit_max_attempts: crate::store::DEFAULT_MAX_ATTEMPTS,
            rate_limit_lockout: crate::store::DEFAULT_LOCKOUT,
            legacy_fallback: false,
            verify_directory_uid: false,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: String) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_cors_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_attempts(mut self, max_attempts: i64) -> Self {
        self.rate_limit_max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_rate_limit_lockout(mut self, lockout: Duration) -> Self {
        self.rate_limit_lockout = lockout;
        self
    }

    #[must_use]
    pub fn with_legacy_fallback(mut self, enabled: bool) -> Self {
        self.legacy_fallback = enabled;
        self
    }

    #[must_use]
    pub fn with_verify_directory_uid(mut self, enabled: bool) -> Self {
        self.verify_directory_uid = enabled;
        self
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn cors_allowed_origins(&self) -> &[String] {
        &self.cors_allowed_origins
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn rate_limit_max_attempts(&self) -> i64 {
        self.rate_limit_max_attempts
    }

    #[must_use]
    pub fn rate_limit_lockout(&self) -> Duration {
        self.rate_limit_lockout
    }

    #[must_use]
    pub fn legacy_fallback(&self) -> bool {
        self.legacy_fallback
    }

    #[must_use]
    pub fn verify_directory_uid(&self) -> bool {
        self.verify_directory_uid
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == "development"
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

/// Split a comma-separated origin list, dropping empties.
#[must_use]
pub fn parse_allowed_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
