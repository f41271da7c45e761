//! # tally-core
//!
//! Core types, traits, and business rules for tally, a freelancer invoicing
//! service.
//!
//! This crate holds the data model, the repository and provider traits the
//! other crates implement, and the rules that do not need I/O of their own:
//! reminder tier evaluation, reminder deduplication, plan limits and request
//! validation.

pub mod billing;
pub mod defaults;
pub mod error;
pub mod limits;
pub mod logging;
pub mod memory;
pub mod models;
pub mod reminders;
pub mod traits;
pub mod uuid_utils;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result, PG_UNDEFINED_TABLE};
pub use limits::{month_start, LimitAction, PlanEnforcer, PlanLimits, PlanStatus};
pub use models::*;
pub use reminders::{
    DedupReport, DedupSweep, ReminderDecision, ReminderDispatcher, ReminderRunner, ScanReport,
    SkipReason, TierSchedule, TriggerOutcome,
};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
