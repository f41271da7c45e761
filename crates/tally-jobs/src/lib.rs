//! # tally-jobs
//!
//! Background processing for tally:
//! - a worker that claims jobs from the queue and runs them concurrently
//! - handlers for reminder scans, the reminder dedup sweep, overdue marking
//!   and account purges
//! - a scheduler that queues the recurring jobs on fixed intervals
//!
//! ## Example
//!
//! ```ignore
//! use tally_db::Database;
//! use tally_jobs::{OverdueMarkingHandler, WorkerBuilder, WorkerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let worker = WorkerBuilder::for_database(&db)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(OverdueMarkingHandler::new(db.invoices.clone()))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod handlers;
pub mod scheduler;
pub mod worker;

// Re-export core types
pub use tally_core::*;

pub use handler::{JobContext, JobHandler, JobResult};
pub use handlers::{
    AccountPurgeHandler, DedupPayload, OverdueMarkingHandler, ReminderDedupHandler,
    ReminderScanHandler, ScanPayload,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
