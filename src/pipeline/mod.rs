//! Pipeline Orchestrator
//!
//! Validates generation requests, opens a job, and hands it to the worker pool. Each
//! job then runs `generating → persisting → published` detached from the caller;
//! the outline and its lesson bodies are both produced while `generating`. Every
//! failure inside a run, including a panic, ends as a generation log row plus job
//! status `error`; nothing propagates back to the caller or takes down the host.

pub mod queue;

use crate::auth::{require_admin, Requester};
use crate::error::PipelineError;
use crate::generator::ContentGenerator;
use crate::jobs::{
    GenerationJob, GenerationLog, JobStatus, JobTracker, LogOutcome, JOB_TYPE_COURSE_GENERATION,
};
use crate::store::ids::{course_path, entity_id};
use crate::writer::EntityWriter;
use futures::FutureExt;
use queue::{JobQueue, QueueConfig, QueueStats};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_FIELD_CHARS: usize = 200;
pub const MIN_MODULE_COUNT: i64 = 1;
pub const MAX_MODULE_COUNT: i64 = 20;

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGenerationRequest {
    pub topic: String,
    pub audience: String,
    pub module_count: u32,
}

fn required_text(field: &str, value: &str) -> Result<String, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation(format!(
            "Field \"{}\" is required and must be a non-empty string",
            field
        )));
    }
    if trimmed.chars().count() > MAX_FIELD_CHARS {
        return Err(PipelineError::Validation(format!(
            "Field \"{}\" must be at most {} characters",
            field, MAX_FIELD_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

fn module_count_error() -> PipelineError {
    PipelineError::Validation(format!(
        "Field \"moduleCount\" must be an integer between {} and {}",
        MIN_MODULE_COUNT, MAX_MODULE_COUNT
    ))
}

impl CourseGenerationRequest {
    pub fn new(topic: &str, audience: &str, module_count: i64) -> Result<Self, PipelineError> {
        let topic = required_text("topic", topic)?;
        let audience = required_text("audience", audience)?;
        if !(MIN_MODULE_COUNT..=MAX_MODULE_COUNT).contains(&module_count) {
            return Err(module_count_error());
        }
        Ok(Self {
            topic,
            audience,
            module_count: module_count as u32,
        })
    }

    /// Validate an untyped JSON body (`{topic, audience, moduleCount}`).
    pub fn from_json(body: &Value) -> Result<Self, PipelineError> {
        let text_field = |field: &str| -> Result<&str, PipelineError> {
            body.get(field).and_then(Value::as_str).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "Field \"{}\" is required and must be a non-empty string",
                    field
                ))
            })
        };
        let topic = text_field("topic")?;
        let audience = text_field("audience")?;

        let module_count = match body.get("moduleCount") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .ok_or_else(module_count_error)?,
            _ => return Err(module_count_error()),
        };

        Self::new(topic, audience, module_count)
    }
}

/// Synchronous acknowledgment returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAck {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Result of one detached run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Published {
        course_id: Uuid,
    },
    Failed {
        error: String,
        code: &'static str,
        log: LogOutcome,
    },
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs a single job to completion or to a recorded failure.
pub struct PipelineRunner {
    tracker: Arc<JobTracker>,
    generator: Arc<ContentGenerator>,
    writer: Arc<EntityWriter>,
}

impl PipelineRunner {
    pub fn new(
        tracker: Arc<JobTracker>,
        generator: Arc<ContentGenerator>,
        writer: Arc<EntityWriter>,
    ) -> Self {
        Self {
            tracker,
            generator,
            writer,
        }
    }

    pub async fn run_job(&self, job_id: &Uuid) -> RunOutcome {
        let error = match AssertUnwindSafe(self.execute(job_id)).catch_unwind().await {
            Ok(Ok(course_id)) => return RunOutcome::Published { course_id },
            Ok(Err(e)) => e,
            Err(payload) => {
                PipelineError::Internal(format!("Job panicked: {}", panic_message(&*payload)))
            }
        };

        let (requester_id, stage, attempt) = match self.tracker.get(job_id) {
            Ok(job) => (job.requester_id, job.status.as_str(), job.attempts),
            Err(_) => (String::new(), "unknown", 0),
        };
        error!(
            job_id = %job_id,
            stage,
            code = error.code(),
            error = %error,
            "Course generation failed"
        );

        let message = error.to_string();
        let details = json!({
            "code": error.code(),
            "stage": stage,
            "attempt": attempt,
        });
        let log = self.tracker.record_failure(
            job_id,
            JOB_TYPE_COURSE_GENERATION,
            &message,
            details,
            &requester_id,
        );

        RunOutcome::Failed {
            error: message,
            code: error.code(),
            log,
        }
    }

    async fn execute(&self, job_id: &Uuid) -> Result<Uuid, PipelineError> {
        let job = self.tracker.transition(job_id, JobStatus::Generating)?;
        let mut outline = self
            .generator
            .generate(&job.topic, &job.audience, job.module_count)
            .await?;
        self.generator
            .write_lessons(&mut outline, &job.audience)
            .await?;

        if outline.modules.len() != job.module_count as usize {
            warn!(
                job_id = %job_id,
                requested = job.module_count,
                generated = outline.modules.len(),
                "Generated module count differs from request"
            );
        }

        let job = self.tracker.transition(job_id, JobStatus::Persisting)?;
        self.tracker
            .set_course(job_id, entity_id(job_id, &course_path()))?;
        let course_id = self.writer.persist(&outline, &job)?;
        self.tracker.transition(job_id, JobStatus::Published)?;
        Ok(course_id)
    }
}

/// Job record plus its failure history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job: GenerationJob,
    pub logs: Vec<GenerationLog>,
}

pub struct PipelineOrchestrator {
    tracker: Arc<JobTracker>,
    runner: Arc<PipelineRunner>,
    queue: JobQueue,
}

impl PipelineOrchestrator {
    pub fn new(
        tracker: Arc<JobTracker>,
        generator: Arc<ContentGenerator>,
        writer: Arc<EntityWriter>,
        queue_config: QueueConfig,
    ) -> Self {
        let runner = Arc::new(PipelineRunner::new(tracker.clone(), generator, writer));
        let queue = JobQueue::new(runner.clone(), queue_config);
        Self {
            tracker,
            runner,
            queue,
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Open a job and schedule it. Returns as soon as the job is queued.
    pub async fn submit(
        &self,
        requester: &Requester,
        request: CourseGenerationRequest,
    ) -> Result<JobAck, PipelineError> {
        require_admin(requester)?;
        let job = self.tracker.open(
            &requester.user_id,
            &request.topic,
            &request.audience,
            request.module_count,
        )?;
        self.schedule(&job).await
    }

    /// Reopen a failed job and schedule it again under the same id.
    pub async fn retry(&self, job_id: &Uuid) -> Result<JobAck, PipelineError> {
        let job = self.tracker.reopen(job_id)?;
        self.schedule(&job).await
    }

    async fn schedule(&self, job: &GenerationJob) -> Result<JobAck, PipelineError> {
        if let Err(e) = self.queue.enqueue(job.id).await {
            // The job exists but will never run; close it so it does not linger.
            self.tracker.record_failure(
                &job.id,
                JOB_TYPE_COURSE_GENERATION,
                &e.to_string(),
                json!({ "code": e.code(), "stage": "queue" }),
                &job.requester_id,
            );
            return Err(e);
        }
        info!(job_id = %job.id, "Course generation started");
        Ok(JobAck {
            job_id: job.id,
            status: JobStatus::Started,
        })
    }

    /// Open and run a job in the caller's task.
    pub async fn run_inline(
        &self,
        requester: &Requester,
        request: CourseGenerationRequest,
    ) -> Result<(GenerationJob, RunOutcome), PipelineError> {
        require_admin(requester)?;
        let job = self.tracker.open(
            &requester.user_id,
            &request.topic,
            &request.audience,
            request.module_count,
        )?;
        let outcome = self.runner.run_job(&job.id).await;
        Ok((self.tracker.get(&job.id)?, outcome))
    }

    /// Reopen a failed job and run it in the caller's task.
    pub async fn retry_inline(
        &self,
        job_id: &Uuid,
    ) -> Result<(GenerationJob, RunOutcome), PipelineError> {
        self.tracker.reopen(job_id)?;
        let outcome = self.runner.run_job(job_id).await;
        Ok((self.tracker.get(job_id)?, outcome))
    }

    pub fn job_detail(&self, job_id: &Uuid) -> Result<JobDetail, PipelineError> {
        Ok(JobDetail {
            job: self.tracker.get(job_id)?,
            logs: self.tracker.logs(job_id)?,
        })
    }

    pub fn start(&self) {
        self.queue.start();
    }

    /// Drain queued work (bounded by `timeout`) and stop the workers.
    pub async fn shutdown(&self, timeout: Duration) {
        if let Err(e) = self.queue.wait_for_idle(Some(timeout)).await {
            warn!(error = %e, "Shutting down with generation jobs still queued");
        }
        self.queue.stop().await;
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> Result<(), PipelineError> {
        self.queue.wait_for_idle(timeout).await
    }
}
