//! Shared application state.

use std::sync::Arc;

use tally_core::memory::{InMemoryStore, StaticPaymentProvider};
use tally_core::{
    AccountRepository, ClientRepository, DedupSweep, EstimateRepository, InvoiceRepository,
    JobRepository, PaymentProvider, PlanEnforcer, ReminderDispatcher, ReminderRepository,
    ReminderRunner,
};
use tally_db::Database;

use crate::middleware::GlobalRateLimiter;

/// The repositories a request may touch.
#[derive(Clone)]
pub struct Repositories {
    pub clients: Arc<dyn ClientRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub estimates: Arc<dyn EstimateRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub jobs: Arc<dyn JobRepository>,
}

impl Repositories {
    pub fn from_database(db: &Database) -> Self {
        Self {
            clients: db.clients.clone(),
            invoices: db.invoices.clone(),
            estimates: db.estimates.clone(),
            reminders: db.reminders.clone(),
            accounts: db.accounts.clone(),
            jobs: db.jobs.clone(),
        }
    }

    /// Every repository backed by one in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            clients: store.clone(),
            invoices: store.clone(),
            estimates: store.clone(),
            reminders: store.clone(),
            accounts: store.clone(),
            jobs: store,
        }
    }

    pub fn runner(&self, dispatcher: ReminderDispatcher) -> ReminderRunner {
        ReminderRunner::new(
            self.invoices.clone(),
            self.reminders.clone(),
            self.accounts.clone(),
            dispatcher,
        )
    }

    pub fn enforcer(&self) -> PlanEnforcer {
        PlanEnforcer::new(
            self.accounts.clone(),
            self.clients.clone(),
            self.invoices.clone(),
        )
    }
}

/// Webhook signing secrets. `None` for email disables verification;
/// `None` for payments rejects every payment webhook.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub email: Option<String>,
    pub payments: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub enforcer: PlanEnforcer,
    pub runner: ReminderRunner,
    pub sweep: Arc<DedupSweep>,
    pub payments: Arc<dyn PaymentProvider>,
    pub webhooks: WebhookSecrets,
    pub app_base_url: Arc<str>,
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
    /// Present when backed by Postgres; used by the health check.
    pub db: Option<Database>,
}

impl AppState {
    /// State over `repos` with the given reminder runner.
    ///
    /// Payments default to [`StaticPaymentProvider`]; call
    /// [`AppState::with_payments`] to use a real provider.
    pub fn new(repos: Repositories, runner: ReminderRunner) -> Self {
        Self {
            enforcer: repos.enforcer(),
            sweep: Arc::new(DedupSweep::from_env(repos.reminders.clone())),
            runner,
            repos,
            payments: Arc::new(StaticPaymentProvider),
            webhooks: WebhookSecrets::default(),
            app_base_url: Arc::from("http://localhost:3000"),
            rate_limiter: None,
            db: None,
        }
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentProvider>) -> Self {
        self.payments = payments;
        self
    }

    /// Share a sweep with the background worker.
    pub fn with_sweep(mut self, sweep: Arc<DedupSweep>) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn with_webhook_secrets(mut self, webhooks: WebhookSecrets) -> Self {
        self.webhooks = webhooks;
        self
    }

    pub fn with_app_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.app_base_url = Arc::from(url.as_ref().trim_end_matches('/'));
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }
}
