//! Job Tracker
//!
//! Owns the generation job lifecycle. A job id is assigned before any background work
//! and is the only handle the caller gets back. Status moves strictly
//! `started → generating → persisting → published`; any non-terminal status may drop
//! to `error`, and only an explicit retry reopens an errored job.
//!
//! Failures inside a detached run are recorded best-effort: `record_failure` never
//! returns an error, it reports whether the failure was durably recorded.

use crate::error::{PipelineError, StorageError};
use crate::logging::OPERATOR_TARGET;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const JOB_TYPE_COURSE_GENERATION: &str = "course_generation";
pub const LOG_STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Generating,
    Persisting,
    Published,
    #[serde(rename = "error")]
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Started => "started",
            JobStatus::Generating => "generating",
            JobStatus::Persisting => "persisting",
            JobStatus::Published => "published",
            JobStatus::Failed => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Published | JobStatus::Failed)
    }

    /// Forward edges of the state machine. `Failed → Started` is not here; it is
    /// only reachable through `JobTracker::reopen`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Started, JobStatus::Generating)
                | (JobStatus::Generating, JobStatus::Persisting)
                | (JobStatus::Persisting, JobStatus::Published)
                | (JobStatus::Started, JobStatus::Failed)
                | (JobStatus::Generating, JobStatus::Failed)
                | (JobStatus::Persisting, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: Uuid,
    pub requester_id: String,
    pub topic: String,
    pub audience: String,
    pub module_count: u32,
    pub status: JobStatus,
    pub course_id: Option<Uuid>,
    /// Number of runs started for this job, including retries.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLog {
    pub job_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub error_message: String,
    pub error_details: Value,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl GenerationLog {
    pub fn error(
        job_id: Uuid,
        job_type: &str,
        message: impl Into<String>,
        details: Value,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            job_type: job_type.to_string(),
            status: LOG_STATUS_ERROR.to_string(),
            error_message: message.into(),
            error_details: details,
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Whether a failure reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LogOutcome {
    Recorded,
    Degraded { reason: String },
}

impl LogOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, LogOutcome::Degraded { .. })
    }
}

pub struct JobTracker {
    store: Arc<dyn JobStore>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Create a job in `started`. Runs before any background work is scheduled.
    pub fn open(
        &self,
        requester_id: &str,
        topic: &str,
        audience: &str,
        module_count: u32,
    ) -> Result<GenerationJob, PipelineError> {
        let now = Utc::now();
        let job = GenerationJob {
            id: Uuid::new_v4(),
            requester_id: requester_id.to_string(),
            topic: topic.to_string(),
            audience: audience.to_string(),
            module_count,
            status: JobStatus::Started,
            course_id: None,
            attempts: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.put_job(&job)?;
        info!(
            job_id = %job.id,
            requester_id,
            topic,
            audience,
            module_count,
            "Generation job opened"
        );
        Ok(job)
    }

    pub fn get(&self, job_id: &Uuid) -> Result<GenerationJob, PipelineError> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("Job {} not found", job_id)))
    }

    pub fn list(&self) -> Result<Vec<GenerationJob>, PipelineError> {
        Ok(self.store.list_jobs()?)
    }

    pub fn logs(&self, job_id: &Uuid) -> Result<Vec<GenerationLog>, PipelineError> {
        Ok(self.store.list_logs(job_id)?)
    }

    /// Move a job along the state machine.
    pub fn transition(
        &self,
        job_id: &Uuid,
        next: JobStatus,
    ) -> Result<GenerationJob, PipelineError> {
        let mut job = self.get(job_id)?;
        if !job.status.can_transition_to(next) {
            return Err(PipelineError::Internal(format!(
                "Invalid job transition for {}: {} -> {}",
                job_id, job.status, next
            )));
        }
        debug!(job_id = %job_id, from = %job.status, to = %next, "Job transition");
        job.status = next;
        job.updated_at = Utc::now();
        self.store.put_job(&job)?;
        Ok(job)
    }

    pub fn set_course(&self, job_id: &Uuid, course_id: Uuid) -> Result<(), PipelineError> {
        let mut job = self.get(job_id)?;
        job.course_id = Some(course_id);
        job.updated_at = Utc::now();
        self.store.put_job(&job)?;
        Ok(())
    }

    /// Reopen an errored job for another run under the same id.
    pub fn reopen(&self, job_id: &Uuid) -> Result<GenerationJob, PipelineError> {
        let mut job = self.get(job_id)?;
        if job.status != JobStatus::Failed {
            return Err(PipelineError::Validation(format!(
                "Only failed jobs can be retried (job {} is {})",
                job_id, job.status
            )));
        }
        job.status = JobStatus::Started;
        job.attempts += 1;
        job.updated_at = Utc::now();
        self.store.put_job(&job)?;
        info!(job_id = %job_id, attempt = job.attempts, "Generation job reopened");
        Ok(job)
    }

    /// Append a failure row and mark the job `error`. Never fails: problems while
    /// recording are reported as `LogOutcome::Degraded` and on the operator channel.
    pub fn record_failure(
        &self,
        job_id: &Uuid,
        job_type: &str,
        message: &str,
        details: Value,
        requester_id: &str,
    ) -> LogOutcome {
        let mut problems = Vec::new();

        let log = GenerationLog::error(*job_id, job_type, message, details, requester_id);
        if let Err(e) = self.store.append_log(&log) {
            problems.push(format!("failed to append generation log: {}", e));
        }

        if let Err(e) = self.mark_failed(job_id) {
            problems.push(format!("failed to mark job as error: {}", e));
        }

        if problems.is_empty() {
            LogOutcome::Recorded
        } else {
            let reason = problems.join("; ");
            error!(
                target: OPERATOR_TARGET,
                job_id = %job_id,
                job_type,
                original_error = message,
                reason = %reason,
                "Generation failure could not be fully recorded"
            );
            LogOutcome::Degraded { reason }
        }
    }

    fn mark_failed(&self, job_id: &Uuid) -> Result<(), PipelineError> {
        let job = self.get(job_id)?;
        if job.status == JobStatus::Failed {
            return Ok(());
        }
        self.transition(job_id, JobStatus::Failed).map(|_| ())
    }

    /// Fail every job left mid-run by a previous process. Returns how many were
    /// closed.
    pub fn recover_interrupted(&self) -> Result<usize, PipelineError> {
        let mut recovered = 0;
        for job in self.store.list_jobs()? {
            if job.status.is_terminal() {
                continue;
            }
            let details = serde_json::json!({
                "code": "INTERRUPTED",
                "stage": job.status.as_str(),
            });
            let outcome = self.record_failure(
                &job.id,
                JOB_TYPE_COURSE_GENERATION,
                "Job interrupted before completion",
                details,
                &job.requester_id,
            );
            if let LogOutcome::Degraded { reason } = outcome {
                return Err(PipelineError::Storage(StorageError::InvalidRecord(reason)));
            }
            recovered += 1;
        }
        if recovered > 0 {
            info!(recovered, "Interrupted generation jobs marked as error");
        }
        Ok(recovered)
    }
}
