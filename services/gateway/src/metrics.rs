//! Gateway counters with Prometheus text exposition.
//!
//! A small process-wide registry of atomic counters; `/metrics` renders the
//! exposition format directly. The degraded-store counter exists so that
//! fail-open decisions are observable instead of silent.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Success,
    Failure,
    Blocked,
}

impl LoginStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Success,
    Invalid,
    Expired,
    Revoked,
}

impl ValidationStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    login_success: AtomicU64,
    login_failure: AtomicU64,
    login_blocked: AtomicU64,
    validation_success: AtomicU64,
    validation_invalid: AtomicU64,
    validation_expired: AtomicU64,
    validation_revoked: AtomicU64,
    rate_limit_hits: AtomicU64,
    store_degraded: AtomicU64,
    // Ordered map keeps the exposition output stable.
    http_requests: Mutex<BTreeMap<(String, String, u16), u64>>,
}

impl GatewayMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_login(&self, status: LoginStatus) {
        let counter = match status {
            LoginStatus::Success => &self.login_success,
            LoginStatus::Failure => &self.login_failure,
            LoginStatus::Blocked => &self.login_blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self, status: ValidationStatus) {
        let counter = match status {
            ValidationStatus::Success => &self.validation_success,
            ValidationStatus::Invalid => &self.validation_invalid,
            ValidationStatus::Expired => &self.validation_expired,
            ValidationStatus::Revoked => &self.validation_revoked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A rate-limit or blacklist decision was taken without the store.
    pub fn record_store_degraded(&self) {
        self.store_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16) {
        if let Ok(mut requests) = self.http_requests.lock() {
            *requests
                .entry((method.to_string(), path.to_string(), status))
                .or_insert(0) += 1;
        }
    }

    #[must_use]
    pub fn store_degraded_total(&self) -> u64 {
        self.store_degraded.load(Ordering::Relaxed)
    }

    /// Render the Prometheus text exposition.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(2048);

        let _ = writeln!(
            out,
            "# HELP auth_login_attempts_total Credential attempts handled by the gateway"
        );
        let _ = writeln!(out, "# TYPE auth_login_attempts_total counter");
        for (status, counter) in [
            ("success", &self.login_success),
            ("failure", &self.login_failure),
            ("blocked", &self.login_blocked),
        ] {
            let _ = writeln!(
                out,
                "auth_login_attempts_total{{status=\"{status}\"}} {}",
                counter.load(Ordering::Relaxed)
            );
        }

        let _ = writeln!(
            out,
            "# HELP auth_token_validations_total Bearer token validations"
        );
        let _ = writeln!(out, "# TYPE auth_token_validations_total counter");
        for (status, counter) in [
            ("success", &self.validation_success),
            ("invalid", &self.validation_invalid),
            ("expired", &self.validation_expired),
            ("revoked", &self.validation_revoked),
        ] {
            let _ = writeln!(
                out,
                "auth_token_validations_total{{status=\"{status}\"}} {}",
                counter.load(Ordering::Relaxed)
            );
        }

        let _ = writeln!(
            out,
            "# HELP auth_rate_limit_hits_total Login attempts denied by the rate limiter"
        );
        let _ = writeln!(out, "# TYPE auth_rate_limit_hits_total counter");
        let _ = writeln!(
            out,
            "auth_rate_limit_hits_total {}",
            self.rate_limit_hits.load(Ordering::Relaxed)
        );

        let _ = writeln!(
            out,
            "# HELP auth_store_degraded_total Fail-open decisions taken while the key-value store was unreachable"
        );
        let _ = writeln!(out, "# TYPE auth_store_degraded_total counter");
        let _ = writeln!(
            out,
            "auth_store_degraded_total {}",
            self.store_degraded.load(Ordering::Relaxed)
        );

        let _ = writeln!(out, "# HELP http_requests_total HTTP requests served");
        let _ = writeln!(out, "# TYPE http_requests_total counter");
        if let Ok(requests) = self.http_requests.lock() {
            for ((method, path, status), count) in requests.iter() {
                let _ = writeln!(
                    out,
                    "http_requests_total{{method=\"{method}\",path=\"{path}\",status=\"{status}\"}} {count}"
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        let metrics = GatewayMetrics::new();
        metrics.record_login(LoginStatus::Success);
        metrics.record_login(LoginStatus::Failure);
        metrics.record_login(LoginStatus::Failure);
        metrics.record_validation(ValidationStatus::Revoked);
        metrics.record_rate_limit_hit();
        metrics.record_store_degraded();

        let text = metrics.render();
        assert!(text.contains("auth_login_attempts_total{status=\"success\"} 1"));
        assert!(text.contains("auth_login_attempts_total{status=\"failure\"} 2"));
        assert!(text.contains("auth_token_validations_total{status=\"revoked\"} 1"));
        assert!(text.contains("auth_rate_limit_hits_total 1"));
        assert!(text.contains("auth_store_degraded_total 1"));
    }

    #[test]
    fn request_counts_are_labelled() {
        let metrics = GatewayMetrics::new();
        metrics.record_request("POST", "/auth/login", 200);
        metrics.record_request("POST", "/auth/login", 200);
        metrics.record_request("GET", "/health", 200);

        let text = metrics.render();
        assert!(
            text.contains("http_requests_total{method=\"POST\",path=\"/auth/login\",status=\"200\"} 2")
        );
        assert!(
            text.contains("http_requests_total{method=\"GET\",path=\"/health\",status=\"200\"} 1")
        );
    }

    #[test]
    fn exposition_has_help_and_type_lines() {
        let metrics = GatewayMetrics::new();
        let text = metrics.render();
        for family in [
            "auth_login_attempts_total",
            "auth_token_validations_total",
            "auth_rate_limit_hits_total",
            "auth_store_degraded_total",
            "http_requests_total",
        ] {
            assert!(text.contains(&format!("# HELP {family}")));
            assert!(text.contains(&format!("# TYPE {family} counter")));
        }
    }
}
