//! # tally-api
//!
//! HTTP surface for tally. The binary in `main.rs` wires Postgres, the
//! providers and the background worker into [`AppState`]; tests build the
//! same [`router`] over the in-memory store.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use tally_core::defaults;

pub use config::{parse_allowed_origins, ApiConfig, RateLimitConfig};
pub use error::ApiError;
pub use extract::{AuthUser, USER_ID_HEADER};
pub use middleware::{build_rate_limiter, MakeRequestUuidV7};
pub use state::{AppState, Repositories, WebhookSecrets};

use handlers::{account, clients, estimates, health, invoices, jobs, reminders, webhooks};

/// Build the full application router.
pub fn router(state: AppState, config: &ApiConfig) -> Router {
    let api = Router::new()
        .route(
            "/profile",
            get(account::get_profile).put(account::put_profile),
        )
        .route("/subscription", get(account::subscription))
        .route("/account", axum::routing::delete(account::delete_account))
        // Clients
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/:id",
            get(clients::get_client)
                .patch(clients::update_client)
                .delete(clients::delete_client),
        )
        // Invoices
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route("/invoices/:id", get(invoices::get_invoice))
        .route("/invoices/:id/send", post(invoices::send_invoice))
        .route("/invoices/:id/pay", post(invoices::pay_invoice))
        .route("/invoices/:id/checkout", post(invoices::create_checkout))
        .route(
            "/invoices/:id/reminders",
            get(invoices::list_invoice_reminders).post(invoices::trigger_reminder),
        )
        // Estimates
        .route(
            "/estimates",
            get(estimates::list_estimates).post(estimates::create_estimate),
        )
        .route("/estimates/:id", get(estimates::get_estimate))
        .route("/estimates/:id/send", post(estimates::send_estimate))
        .route("/estimates/:id/accept", post(estimates::accept_estimate))
        .route("/estimates/:id/decline", post(estimates::decline_estimate))
        .route("/estimates/:id/convert", post(estimates::convert_to_invoice))
        // Reminders and jobs
        .route("/reminders", get(reminders::list_reminders))
        .route("/reminders/run", post(reminders::run_reminders))
        .route("/reminders/dedup", post(reminders::dedup_reminders))
        .route("/jobs/:id", get(jobs::get_job))
        // Provider webhooks authenticate by signature, not x-user-id.
        .route("/webhooks/email", post(webhooks::email_webhook))
        .route("/webhooks/payments", post(webhooks::payments_webhook));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(USER_ID_HEADER),
                ])
                .allow_credentials(true)
                .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS)),
        )
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}
