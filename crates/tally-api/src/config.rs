//! Server configuration read from the environment.

use axum::http::HeaderValue;
use tracing::warn;

use tally_core::defaults;

const DEFAULT_ORIGINS: &str = "http://localhost:3000";

/// Global request rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u64,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: defaults::RATE_LIMIT_REQUESTS,
            period_secs: defaults::RATE_LIMIT_PERIOD_SECS,
        }
    }
}

impl RateLimitConfig {
    /// `RATE_LIMIT_ENABLED`, `RATE_LIMIT_REQUESTS`, `RATE_LIMIT_PERIOD_SECS`.
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            requests: std::env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_REQUESTS),
            period_secs: std::env::var("RATE_LIMIT_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// HTTP-facing settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<HeaderValue>,
    pub rate_limit: RateLimitConfig,
    pub max_body_bytes: usize,
    /// Public base URL of the web app; checkout redirects land here.
    pub app_base_url: String,
    /// HMAC secret for email delivery webhooks. Unset disables verification.
    pub email_webhook_secret: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/tally".to_string(),
            allowed_origins: parse_allowed_origins(DEFAULT_ORIGINS),
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: defaults::MAX_BODY_SIZE_BYTES,
            app_base_url: "http://localhost:3000".to_string(),
            email_webhook_secret: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(base.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(base.database_url),
            allowed_origins: parse_allowed_origins(
                &std::env::var("ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            rate_limit: RateLimitConfig::from_env(),
            max_body_bytes: base.max_body_bytes,
            app_base_url: std::env::var("APP_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(base.app_base_url),
            email_webhook_secret: std::env::var("EMAIL_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_email_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.email_webhook_secret = Some(secret.into());
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated origin list. Blank input yields the defaults;
/// entries that are not valid header values are dropped with a warning.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    let raw = if raw.trim().is_empty() {
        DEFAULT_ORIGINS
    } else {
        raw
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) if origin.contains("://") => Some(v),
            Ok(_) => {
                warn!(origin, "Ignoring CORS origin without scheme");
                None
            }
            Err(e) => {
                warn!(origin, error = %e, "Invalid CORS origin");
                None
            }
        })
        .collect()
}
