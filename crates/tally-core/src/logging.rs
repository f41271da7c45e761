//! Structured logging schema and field name constants for tally.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (provider failure, skipped table) |
//! | INFO  | Lifecycle events, job completions, sweep/scan summaries |
//! | DEBUG | Decision points (reminder decisions, plan checks) |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "jobs", "reminders", "providers"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "evaluator", "sweep", "dispatch", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Account owner UUID.
pub const OWNER_ID: &str = "owner_id";

/// Invoice UUID being operated on.
pub const INVOICE_ID: &str = "invoice_id";

/// Reminder UUID being operated on.
pub const REMINDER_ID: &str = "reminder_id";

/// Reminder escalation tier.
pub const TIER: &str = "tier";

/// Provider message id returned by the email API.
pub const MESSAGE_ID: &str = "message_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Whole days an invoice is past due.
pub const OVERDUE_DAYS: &str = "overdue_days";

/// Rows examined by a batch operation.
pub const SCANNED: &str = "scanned";

/// Rows removed by a batch operation.
pub const REMOVED: &str = "removed";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Every field name in the schema.
pub const ALL_FIELDS: &[&str] = &[
    REQUEST_ID,
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    OWNER_ID,
    INVOICE_ID,
    REMINDER_ID,
    TIER,
    MESSAGE_ID,
    JOB_ID,
    JOB_TYPE,
    DURATION_MS,
    OVERDUE_DAYS,
    SCANNED,
    REMOVED,
    POOL_SIZE,
    POOL_IDLE,
    DB_TABLE,
    SUCCESS,
    ERROR_MSG,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_unique_snake_case() {
        let unique: HashSet<_> = ALL_FIELDS.iter().collect();
        assert_eq!(unique.len(), ALL_FIELDS.len());
        for field in ALL_FIELDS {
            assert!(
                field.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{field} is not snake_case"
            );
        }
    }
}
