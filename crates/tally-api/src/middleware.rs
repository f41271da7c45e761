//! Request id generation and global rate limiting.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{info, warn};

use crate::config::RateLimitConfig;
use crate::state::AppState;

/// Request ids are UUIDv7 so they sort by arrival time in logs.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = tally_core::new_v7().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build the process-wide limiter, or `None` when disabled or misconfigured.
pub fn build_rate_limiter(config: &RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.enabled {
        info!(subsystem = "api", "Rate limiting disabled");
        return None;
    }

    let Some(burst) = u32::try_from(config.requests).ok().and_then(NonZeroU32::new) else {
        warn!(
            subsystem = "api",
            requests = config.requests,
            "Invalid rate limit request count; rate limiting disabled"
        );
        return None;
    };
    let period = Duration::from_secs(config.period_secs.max(1)) / burst.get();
    let quota = Quota::with_period(period)?.allow_burst(burst);

    info!(
        subsystem = "api",
        requests = config.requests,
        period_secs = config.period_secs,
        "Rate limiting enabled"
    );
    Some(Arc::new(RateLimiter::direct(quota)))
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": "rate limit exceeded" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_limiter() {
        assert!(build_rate_limiter(&RateLimitConfig::disabled()).is_none());
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = build_rate_limiter(&RateLimitConfig {
            enabled: true,
            requests: 2,
            period_secs: 60,
        })
        .unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_requests_disables() {
        let config = RateLimitConfig {
            enabled: true,
            requests: 0,
            period_secs: 60,
        };
        assert!(build_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_request_id_is_v7() {
        let request = axum::http::Request::new(());
        let id = MakeRequestUuidV7.make_request_id(&request).unwrap();
        let parsed = uuid::Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert!(tally_core::is_v7(&parsed));
    }
}
