//! Reminder deduplication sweep.
//!
//! Groups reminder rows by `(invoice, tier, status)`, keeps the newest row
//! of each group and deletes the rest in bounded batches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::defaults;
use crate::error::Result;
use crate::models::{Reminder, ReminderStatus, ReminderTier};
use crate::traits::{ReminderFilter, ReminderRepository};

/// Rows the sweep would delete, computed without touching the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupPlan {
    /// Ids to delete, grouped keys in no particular order.
    pub delete_ids: Vec<Uuid>,
    /// Groups that had more than one row.
    pub groups_collapsed: usize,
}

/// Outcome of a sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub scanned: usize,
    pub groups_collapsed: usize,
    pub removed: u64,
    pub batches: usize,
}

type GroupKey = (Uuid, ReminderTier, ReminderStatus);

/// Pick the redundant rows in `rows`.
///
/// Within a group the newest `created_at` survives; equal timestamps fall
/// back to the larger id so repeated runs choose the same survivor.
pub fn plan_dedup(rows: &[Reminder]) -> DedupPlan {
    let mut groups: HashMap<GroupKey, Vec<&Reminder>> = HashMap::new();
    for row in rows {
        groups
            .entry((row.invoice_id, row.tier, row.status))
            .or_default()
            .push(row);
    }

    let mut plan = DedupPlan::default();
    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        plan.groups_collapsed += 1;
        plan.delete_ids.extend(group.iter().skip(1).map(|r| r.id));
    }
    plan
}

/// Runs the sweep against a reminder repository.
pub struct DedupSweep {
    reminders: Arc<dyn ReminderRepository>,
    batch_size: usize,
}

impl DedupSweep {
    pub fn new(reminders: Arc<dyn ReminderRepository>) -> Self {
        Self {
            reminders,
            batch_size: defaults::REMINDER_DEDUP_BATCH_SIZE,
        }
    }

    /// Batch size from `REMINDER_DEDUP_BATCH_SIZE`, else the default.
    pub fn from_env(reminders: Arc<dyn ReminderRepository>) -> Self {
        let batch_size = std::env::var("REMINDER_DEDUP_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::REMINDER_DEDUP_BATCH_SIZE);
        Self::new(reminders).with_batch_size(batch_size)
    }

    /// Cap on ids per delete call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sweep every reminder, or only those in `status` when given.
    pub async fn run(&self, status: Option<ReminderStatus>) -> Result<DedupReport> {
        self.run_filtered(ReminderFilter {
            status,
            ..Default::default()
        })
        .await
    }

    /// Sweep the rows matching `filter`. Paging fields are ignored.
    pub async fn run_filtered(&self, filter: ReminderFilter) -> Result<DedupReport> {
        let start = Instant::now();
        let rows = self
            .reminders
            .list(ReminderFilter {
                limit: None,
                offset: None,
                ..filter
            })
            .await?;

        let plan = plan_dedup(&rows);
        let mut report = DedupReport {
            scanned: rows.len(),
            groups_collapsed: plan.groups_collapsed,
            ..Default::default()
        };

        for batch in plan.delete_ids.chunks(self.batch_size) {
            let removed = self.reminders.delete_ids(batch).await?;
            debug!(
                subsystem = "reminders",
                component = "sweep",
                batch = report.batches,
                requested = batch.len(),
                removed,
                "Deleted duplicate reminder batch"
            );
            report.removed += removed;
            report.batches += 1;
        }

        info!(
            subsystem = "reminders",
            component = "sweep",
            op = "dedup",
            scanned = report.scanned,
            groups = report.groups_collapsed,
            removed = report.removed,
            batches = report.batches,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reminder dedup sweep complete"
        );
        Ok(report)
    }
}
