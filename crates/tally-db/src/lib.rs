//! # tally-db
//!
//! PostgreSQL database layer for tally.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every `tally-core` repository trait
//! - Conditional reminder inserts backed by a partial unique index
//! - The background job queue (`FOR UPDATE SKIP LOCKED` claiming)
//!
//! ## Example
//!
//! ```rust,ignore
//! use tally_db::{ClientRepository, CreateClientRequest, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/tally").await?;
//!     db.migrate().await?;
//!
//!     let client = db.clients.insert(owner_id, CreateClientRequest {
//!         name: "Acme Ltd".to_string(),
//!         email: "billing@acme.test".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Created client: {}", client.id);
//!     Ok(())
//! }
//! ```
pub mod accounts;
pub mod clients;
pub mod estimates;
pub mod invoices;
pub mod jobs;
pub mod pool;
pub mod reminders;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

// Re-export core types
pub use tally_core::*;

pub use accounts::{PgAccountRepository, PURGE_TABLES};
pub use clients::PgClientRepository;
pub use estimates::PgEstimateRepository;
pub use invoices::PgInvoiceRepository;
pub use jobs::PgJobRepository;
pub use pool::{
    create_lazy_pool, create_pool, create_pool_with_config, log_pool_metrics, PoolConfig,
};
pub use reminders::PgReminderRepository;

/// Combined database context with all repositories.
///
/// Repositories are reference counted so callers can hand them out as
/// `Arc<dyn Trait>` without reopening the pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub clients: Arc<PgClientRepository>,
    pub invoices: Arc<PgInvoiceRepository>,
    pub estimates: Arc<PgEstimateRepository>,
    pub reminders: Arc<PgReminderRepository>,
    /// Business profile, plan and purge.
    pub accounts: Arc<PgAccountRepository>,
    /// Job repository for background processing.
    pub jobs: Arc<PgJobRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            clients: Arc::new(PgClientRepository::new(pool.clone())),
            invoices: Arc::new(PgInvoiceRepository::new(pool.clone())),
            estimates: Arc::new(PgEstimateRepository::new(pool.clone())),
            reminders: Arc::new(PgReminderRepository::new(pool.clone())),
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            jobs: Arc::new(PgJobRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Round-trip a trivial query; used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
