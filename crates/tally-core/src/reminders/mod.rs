//! Payment reminder rules.
//!
//! - [`schedule`]: ordered overdue-day bands mapped to tiers
//! - [`evaluator`]: decides whether an invoice needs a reminder and at which tier
//! - [`sweep`]: removes redundant reminder rows
//! - [`dispatch`]: renders reminder emails and hands them to the provider
//! - [`delivery`]: applies provider delivery events back to reminder rows
//! - [`runner`]: wires the above to repositories for scans and manual triggers

pub mod delivery;
pub mod dispatch;
pub mod evaluator;
pub mod runner;
pub mod schedule;
pub mod sweep;

pub use delivery::{apply_delivery_event, status_for, DeliveryOutcome};
pub use dispatch::{format_money, html_escape, render, ReminderDispatcher};
pub use evaluator::{evaluate, overdue_days, ReminderDecision, SkipReason};
pub use runner::{ReminderRunner, ScanReport, TriggerOutcome};
pub use schedule::{TierBand, TierSchedule};
pub use sweep::{plan_dedup, DedupPlan, DedupReport, DedupSweep};
