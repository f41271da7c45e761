//! Job handler trait and execution context.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use tally_core::{Error, Job, JobType, Result};

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Account the job was queued for, if any.
    pub fn owner_id(&self) -> Option<Uuid> {
        self.job.owner_id
    }

    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Deserialize the payload, treating a missing payload as `{}`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .job
            .payload
            .clone()
            .unwrap_or_else(|| JsonValue::Object(Default::default()));
        serde_json::from_value(value)
            .map_err(|e| Error::Job(format!("invalid {} payload: {}", self.job.job_type, e)))
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Completed, with optional result data stored on the job row.
    Success(Option<JsonValue>),
    /// Failed; the queue re-queues it while retries remain.
    Failed(String),
}

impl JobResult {
    /// Serialize `report` as the job result, or fail with the error text.
    pub fn from_report<T: serde::Serialize>(outcome: Result<T>) -> Self {
        match outcome {
            Ok(report) => match serde_json::to_value(report) {
                Ok(value) => JobResult::Success(Some(value)),
                Err(e) => JobResult::Failed(format!("unserializable job result: {}", e)),
            },
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    async fn execute(&self, ctx: JobContext) -> JobResult;

    fn can_handle(&self, job_type: JobType) -> bool {
        self.job_type() == job_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tally_core::JobStatus;

    fn job(payload: Option<JsonValue>) -> Job {
        Job {
            id: Uuid::new_v4(),
            owner_id: Some(Uuid::new_v4()),
            job_type: JobType::ReminderScan,
            status: JobStatus::Running,
            priority: 5,
            payload,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[derive(Debug, Default, Deserialize)]
    struct ScanPayload {
        #[serde(default)]
        owner_id: Option<Uuid>,
    }

    #[test]
    fn test_payload_missing_is_empty_object() {
        let ctx = JobContext::new(job(None));
        let payload: ScanPayload = ctx.payload_as().unwrap();
        assert!(payload.owner_id.is_none());
    }

    #[test]
    fn test_payload_wrong_shape_is_job_error() {
        let ctx = JobContext::new(job(Some(serde_json::json!({ "owner_id": 7 }))));
        let err = ctx.payload_as::<ScanPayload>().unwrap_err();
        assert!(matches!(err, Error::Job(_)));
        assert!(err.to_string().contains("reminder_scan"));
    }

    #[test]
    fn test_progress_callback_invoked() {
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::Arc;

        let seen = Arc::new(AtomicI32::new(0));
        let seen_cb = seen.clone();
        let ctx = JobContext::new(job(None))
            .with_progress_callback(move |pct, _| seen_cb.store(pct, Ordering::SeqCst));
        ctx.report_progress(40, Some("halfway"));
        assert_eq!(seen.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn test_from_report() {
        let ok = JobResult::from_report(Ok(serde_json::json!({ "removed": 2 })));
        assert!(matches!(ok, JobResult::Success(Some(_))));
        let failed = JobResult::from_report::<u64>(Err(Error::Internal("boom".into())));
        match failed {
            JobResult::Failed(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
