//! tally API server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{build_rate_limiter, router, ApiConfig, AppState, Repositories, WebhookSecrets};
use tally_core::{DedupSweep, ReminderDispatcher, TierSchedule};
use tally_db::{Database, PoolConfig};
use tally_jobs::{
    AccountPurgeHandler, OverdueMarkingHandler, ReminderDedupHandler, ReminderScanHandler,
    Scheduler, SchedulerConfig, WorkerBuilder, WorkerConfig,
};
use tally_providers::{EmailConfig, PaymentsConfig, ResendEmailProvider, StripePaymentProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // LOG_FORMAT  - "json" or "text" (default: "text")
    // LOG_FILE    - path to log file, rotated daily
    // LOG_ANSI    - "true"/"false" override ANSI colors
    // RUST_LOG    - env filter (default: "tally_api=debug,tally_jobs=info,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tally_api=debug,tally_jobs=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tally-api.log");
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(file_dir, file_name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env();

    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    info!(subsystem = "api", "Database migrations applied");

    // Providers
    let email_config = EmailConfig::from_env();
    if email_config.api_key.is_none() {
        warn!(subsystem = "api", "EMAIL_API_KEY not set; reminder sends will be unauthenticated");
    }
    let from_address = email_config.from_address.clone();
    let email = Arc::new(ResendEmailProvider::new(email_config)?);
    let payments_config = PaymentsConfig::from_env();
    let payments_secret = payments_config.webhook_secret.clone();
    if payments_secret.is_none() {
        warn!(
            subsystem = "api",
            "PAYMENTS_WEBHOOK_SECRET not set; payment webhooks will be rejected"
        );
    }
    let payments = Arc::new(StripePaymentProvider::new(payments_config)?);

    let repos = Repositories::from_database(&db);
    let runner = repos
        .runner(ReminderDispatcher::new(email).with_from_address(from_address))
        .with_schedule(TierSchedule::from_env());
    let sweep = Arc::new(DedupSweep::from_env(repos.reminders.clone()));

    // Background processing
    let worker = WorkerBuilder::for_database(&db)
        .with_config(WorkerConfig::from_env())
        .with_handler(ReminderScanHandler::new(runner.clone()))
        .with_handler(ReminderDedupHandler::new(sweep.clone()))
        .with_handler(OverdueMarkingHandler::new(repos.invoices.clone()))
        .with_handler(AccountPurgeHandler::new(repos.accounts.clone()))
        .build()
        .await;
    let worker_handle = worker.start();
    let scheduler_handle = Scheduler::new(repos.jobs.clone(), SchedulerConfig::from_env()).start();

    let state = AppState::new(repos, runner)
        .with_payments(payments)
        .with_sweep(sweep)
        .with_webhook_secrets(WebhookSecrets {
            email: config.email_webhook_secret.clone(),
            payments: payments_secret,
        })
        .with_app_base_url(&config.app_base_url)
        .with_rate_limiter(build_rate_limiter(&config.rate_limit))
        .with_database(db);

    let app = router(state, &config);

    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped; draining background work");
    scheduler_handle.shutdown().await;
    if let Err(e) = worker_handle.shutdown().await {
        warn!(error = %e, "Worker did not shut down cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
