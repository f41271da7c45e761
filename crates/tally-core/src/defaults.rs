//! Centralized default constants for tally.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own numbers.

// =============================================================================
// REMINDERS
// =============================================================================

/// Default tier band table: `min_overdue_days:tier`, ascending.
pub const REMINDER_TIER_BANDS: &str = "1:friendly,4:polite,8:firm,15:urgent";

/// Maximum reminder ids removed by a single delete statement during a sweep.
pub const REMINDER_DEDUP_BATCH_SIZE: usize = 100;

/// Default interval between automated reminder scans (1 hour).
pub const REMINDER_SCAN_INTERVAL_SECS: u64 = 3600;

/// Default interval between deduplication sweeps (1 day).
pub const REMINDER_DEDUP_INTERVAL_SECS: u64 = 86_400;

/// Default interval between `sent → overdue` marking passes (1 hour).
pub const OVERDUE_MARK_INTERVAL_SECS: u64 = 3600;

// =============================================================================
// PLANS
// =============================================================================

/// Clients allowed on the free plan.
pub const FREE_PLAN_MAX_CLIENTS: u32 = 3;

/// Invoices per calendar month allowed on the free plan.
pub const FREE_PLAN_MAX_INVOICES_PER_MONTH: u32 = 5;

// =============================================================================
// INVOICES
// =============================================================================

/// Default currency for new invoices and estimates.
pub const CURRENCY: &str = "USD";

/// Default payment terms in days (due date = issue date + terms).
pub const PAYMENT_TERMS_DAYS: i64 = 30;

/// Upper bound for tax rates in basis points (100%).
pub const MAX_TAX_BPS: i32 = 10_000;

/// Maximum line items on a single document.
pub const MAX_LINE_ITEMS: usize = 200;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Hard cap for page size.
pub const PAGE_LIMIT_MAX: i64 = 500;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Maximum request body size in bytes (1 MiB).
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

/// Accepted clock skew for signed payment webhooks, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

// =============================================================================
// PROVIDERS
// =============================================================================

/// Default email API base URL (Resend-compatible).
pub const EMAIL_API_URL: &str = "https://api.resend.com";

/// Default sender address for reminder emails.
pub const EMAIL_FROM: &str = "billing@tally.local";

/// Timeout for email requests in seconds.
pub const EMAIL_TIMEOUT_SECS: u64 = 10;

/// Default payments API base URL (Stripe-compatible).
pub const PAYMENTS_API_URL: &str = "https://api.stripe.com/v1";

/// Timeout for payment requests in seconds.
pub const PAYMENTS_TIMEOUT_SECS: u64 = 20;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum retry count for failed jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

/// Default polling interval when the queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrently running jobs.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Per-job execution timeout in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 600;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;
