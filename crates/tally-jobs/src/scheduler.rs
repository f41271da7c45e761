//! Periodic enqueueing of the recurring maintenance jobs.
//!
//! Each recurring job type gets its own interval. A tick queues the job
//! through `queue_deduplicated`, so a slow scan never piles up behind itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use uuid::Uuid;

use tally_core::{defaults, JobRepository, JobType, Result};

/// Intervals for the recurring jobs. A zero interval disables that job.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub reminder_scan_secs: u64,
    pub reminder_dedup_secs: u64,
    pub overdue_mark_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_scan_secs: defaults::REMINDER_SCAN_INTERVAL_SECS,
            reminder_dedup_secs: defaults::REMINDER_DEDUP_INTERVAL_SECS,
            overdue_mark_secs: defaults::OVERDUE_MARK_INTERVAL_SECS,
        }
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl SchedulerConfig {
    /// Read `REMINDER_SCAN_INTERVAL_SECS`, `REMINDER_DEDUP_INTERVAL_SECS` and
    /// `OVERDUE_MARK_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        Self {
            reminder_scan_secs: env_secs(
                "REMINDER_SCAN_INTERVAL_SECS",
                defaults::REMINDER_SCAN_INTERVAL_SECS,
            ),
            reminder_dedup_secs: env_secs(
                "REMINDER_DEDUP_INTERVAL_SECS",
                defaults::REMINDER_DEDUP_INTERVAL_SECS,
            ),
            overdue_mark_secs: env_secs(
                "OVERDUE_MARK_INTERVAL_SECS",
                defaults::OVERDUE_MARK_INTERVAL_SECS,
            ),
        }
    }

    pub fn with_reminder_scan(mut self, secs: u64) -> Self {
        self.reminder_scan_secs = secs;
        self
    }

    pub fn with_reminder_dedup(mut self, secs: u64) -> Self {
        self.reminder_dedup_secs = secs;
        self
    }

    pub fn with_overdue_mark(mut self, secs: u64) -> Self {
        self.overdue_mark_secs = secs;
        self
    }

    /// Enabled jobs with their periods. Overdue marking comes first so a
    /// simultaneous scan sees freshly marked invoices.
    pub fn schedule(&self) -> Vec<(JobType, Duration)> {
        [
            (JobType::OverdueMarking, self.overdue_mark_secs),
            (JobType::ReminderScan, self.reminder_scan_secs),
            (JobType::ReminderDedup, self.reminder_dedup_secs),
        ]
        .into_iter()
        .filter(|(_, secs)| *secs > 0)
        .map(|(job_type, secs)| (job_type, Duration::from_secs(secs)))
        .collect()
    }
}

/// Handle to stop a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        while self.tasks.join_next().await.is_some() {}
        info!(subsystem = "jobs", component = "scheduler", "Scheduler stopped");
    }
}

pub struct Scheduler {
    jobs: Arc<dyn JobRepository>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(jobs: Arc<dyn JobRepository>, config: SchedulerConfig) -> Self {
        Self { jobs, config }
    }

    /// Queue one global run of `job_type` unless one is already pending or running.
    pub async fn enqueue(&self, job_type: JobType) -> Result<Option<Uuid>> {
        enqueue(self.jobs.as_ref(), job_type).await
    }

    /// Spawn one ticking task per enabled job. The first tick fires immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for (job_type, period) in self.config.schedule() {
            let jobs = self.jobs.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            info!(
                subsystem = "jobs",
                component = "scheduler",
                %job_type,
                period_secs = period.as_secs(),
                "Scheduling recurring job"
            );

            tasks.spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = interval.tick() => {
                            if let Err(e) = enqueue(jobs.as_ref(), job_type).await {
                                error!(
                                    subsystem = "jobs",
                                    component = "scheduler",
                                    %job_type,
                                    error = %e,
                                    "Failed to queue recurring job"
                                );
                            }
                        }
                    }
                }
            });
        }

        SchedulerHandle { shutdown_tx, tasks }
    }
}

async fn enqueue(jobs: &dyn JobRepository, job_type: JobType) -> Result<Option<Uuid>> {
    let queued = jobs
        .queue_deduplicated(None, job_type, job_type.default_priority(), None)
        .await?;
    match queued {
        Some(job_id) => debug!(subsystem = "jobs", %job_type, %job_id, "Queued recurring job"),
        None => debug!(subsystem = "jobs", %job_type, "Recurring job already queued"),
    }
    Ok(queued)
}
