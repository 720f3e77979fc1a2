//! CLI route: run context and the single command table.

use crate::api::{self, AppState};
use crate::auth::{Requester, StaticTokenAuthorizer};
use crate::config::{ConfigLoader, CoursegenConfig};
use crate::error::PipelineError;
use crate::generator::ContentGenerator;
use crate::jobs::{JobStatus, JobTracker};
use crate::pipeline::{CourseGenerationRequest, PipelineOrchestrator};
use crate::provider::ProviderFactory;
use crate::store::{CourseStore, SledStore};
use crate::writer::EntityWriter;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::parse::{Commands, JobCommands};
use crate::cli::presentation::{
    format_job_list, format_job_report, format_run_report, JobReport,
};

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

/// Runtime context for CLI execution: loaded config, the open store and the job tracker.
/// The provider client is only built by commands that call the model.
pub struct RunContext {
    config: CoursegenConfig,
    workspace_root: PathBuf,
    store: Arc<SledStore>,
    tracker: Arc<JobTracker>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.ensure_valid()?;

        let store_path = config.storage.resolve_store_path(&workspace_root);
        std::fs::create_dir_all(&store_path)
            .map_err(|e| PipelineError::Storage(crate::error::StorageError::IoError(e)))?;
        let store = Arc::new(SledStore::open(&store_path)?);
        let tracker = Arc::new(JobTracker::new(store.clone()));

        Ok(Self {
            config,
            workspace_root,
            store,
            tracker,
        })
    }

    pub fn config(&self) -> &CoursegenConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    fn orchestrator(&self) -> Result<Arc<PipelineOrchestrator>, PipelineError> {
        let generation = &self.config.generation;
        let client = ProviderFactory::create_client(
            &self.config.provider,
            Duration::from_secs(generation.timeout_secs),
        )?;
        let generator = Arc::new(ContentGenerator::new(client, generation.settings()));
        let writer = Arc::new(EntityWriter::new(self.store.clone()));
        Ok(Arc::new(PipelineOrchestrator::new(
            self.tracker.clone(),
            generator,
            writer,
            generation.queue_config(),
        )))
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, PipelineError> {
        match command {
            Commands::Serve { bind } => self.serve(bind.as_deref()).await,
            Commands::Generate {
                topic,
                audience,
                modules,
                requester,
                format,
            } => {
                let request = CourseGenerationRequest::new(topic, audience, *modules)?;
                let orchestrator = self.orchestrator()?;
                let (job, outcome) = orchestrator
                    .run_inline(&Requester::admin(requester.as_str()), request)
                    .await?;
                self.store.flush()?;
                let report = self.report(job.id)?;
                format_run_report(&report, &outcome, format)
            }
            Commands::Jobs { command } => self.execute_jobs(command).await,
        }
    }

    async fn execute_jobs(&self, command: &JobCommands) -> Result<String, PipelineError> {
        match command {
            JobCommands::Show { job_id, format } => {
                let report = self.report(parse_job_id(job_id)?)?;
                format_job_report(&report, format)
            }
            JobCommands::List { status, format } => {
                let filter = status.as_deref().map(parse_status).transpose()?;
                let jobs: Vec<_> = self
                    .tracker
                    .list()?
                    .into_iter()
                    .filter(|job| filter.map_or(true, |s| job.status == s))
                    .collect();
                format_job_list(&jobs, format)
            }
            JobCommands::Retry { job_id, format } => {
                let job_id = parse_job_id(job_id)?;
                let orchestrator = self.orchestrator()?;
                let (job, outcome) = orchestrator.retry_inline(&job_id).await?;
                self.store.flush()?;
                let report = self.report(job.id)?;
                format_run_report(&report, &outcome, format)
            }
        }
    }

    async fn serve(&self, bind: Option<&str>) -> Result<String, PipelineError> {
        let recovered = self.tracker.recover_interrupted()?;
        if recovered > 0 {
            warn!(recovered, "Closed generation jobs left running by a previous process");
        }

        let orchestrator = self.orchestrator()?;
        if self.config.auth.tokens.is_empty() {
            warn!("No auth tokens configured; every generation request will be rejected");
        }
        let authorizer = Arc::new(StaticTokenAuthorizer::from_config(&self.config.auth));
        let state = AppState::new(orchestrator.clone(), authorizer);
        let bind = bind.unwrap_or(self.config.server.bind.as_str());

        orchestrator.start();
        let served = api::start(state, bind).await;
        info!("Draining generation workers");
        orchestrator.shutdown(SHUTDOWN_DRAIN).await;
        self.store.flush()?;
        served?;

        let stats = orchestrator.stats();
        Ok(format!(
            "Server stopped: {} completed, {} failed, {} degraded",
            stats.completed, stats.failed, stats.degraded
        ))
    }

    /// Job record, failure log and the course tree as far as it was written.
    fn report(&self, job_id: Uuid) -> Result<JobReport, PipelineError> {
        let job = self.tracker.get(&job_id)?;
        let logs = self.tracker.logs(&job_id)?;
        let course = self.store.find_course_by_job(&job_id)?;
        let modules = match course {
            Some(ref course) => self.store.list_modules(&course.id)?,
            None => Vec::new(),
        };
        let quiz_questions = match course {
            Some(ref course) => self.store.list_quiz_questions(&course.id)?.len(),
            None => 0,
        };
        Ok(JobReport {
            job,
            logs,
            course,
            modules,
            quiz_questions,
        })
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, PipelineError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| PipelineError::Validation(format!("Invalid job id: {}", raw)))
}

fn parse_status(raw: &str) -> Result<JobStatus, PipelineError> {
    serde_json::from_value(Value::String(raw.trim().to_lowercase())).map_err(|_| {
        PipelineError::Validation(format!(
            "Unknown job status '{}' (expected started, generating, persisting, published or error)",
            raw
        ))
    })
}
