//! Generation Job Queue
//!
//! Bounded FIFO of job ids drained by a fixed pool of tokio workers. Jobs are never
//! deduplicated or retried here; every dequeued id is handed to the runner once.

use crate::error::PipelineError;
use crate::pipeline::{PipelineRunner, RunOutcome};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Maximum number of pending jobs
    pub max_queue_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_queue_size: 1000,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    /// Jobs waiting for a worker
    pub pending: usize,
    /// Jobs currently running
    pub processing: usize,
    /// Jobs that reached `published`
    pub completed: usize,
    /// Jobs that ended in `error`
    pub failed: usize,
    /// Failures that could not be fully recorded
    pub degraded: usize,
}

struct QueuedJob {
    job_id: Uuid,
    enqueued_at: Instant,
}

pub struct JobQueue {
    queue: Arc<Mutex<VecDeque<QueuedJob>>>,
    notify: Arc<Notify>,
    workers: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
    config: QueueConfig,
    runner: Arc<PipelineRunner>,
    running: Arc<RwLock<bool>>,
    stats: Arc<RwLock<QueueStats>>,
}

impl JobQueue {
    pub fn new(runner: Arc<PipelineRunner>, config: QueueConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            workers: Arc::new(RwLock::new(Vec::new())),
            config,
            runner,
            running: Arc::new(RwLock::new(false)),
            stats: Arc::new(RwLock::new(QueueStats::default())),
        }
    }

    /// Enqueue a job (returns immediately). Fails with `Unavailable` when full.
    pub async fn enqueue(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.config.max_queue_size {
            warn!(
                job_id = %job_id,
                queue_size = queue.len(),
                max_size = self.config.max_queue_size,
                "Generation queue is full, rejecting job"
            );
            return Err(PipelineError::Unavailable(
                "Generation queue is full, try again later".to_string(),
            ));
        }

        queue.push_back(QueuedJob {
            job_id,
            enqueued_at: Instant::now(),
        });
        self.stats.write().pending += 1;
        drop(queue);

        self.notify.notify_one();
        debug!(job_id = %job_id, "Job enqueued");
        Ok(())
    }

    /// Start background workers
    pub fn start(&self) {
        let mut running = self.running.write();
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.write();
        for worker_id in 0..self.config.workers {
            let queue = Arc::clone(&self.queue);
            let notify = Arc::clone(&self.notify);
            let runner = Arc::clone(&self.runner);
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);

            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, queue, notify, runner, running, stats).await;
            }));
        }

        info!(worker_count = workers.len(), "Started generation queue workers");
    }

    /// Stop background workers. In-flight jobs finish; pending jobs stay queued.
    pub async fn stop(&self) {
        let mut running = self.running.write();
        if !*running {
            return;
        }
        *running = false;
        drop(running);

        self.notify.notify_waiters();
        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Generation worker ended abnormally");
            }
        }

        info!("Stopped generation queue workers");
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Wait until nothing is pending or running.
    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> Result<(), PipelineError> {
        let start = Instant::now();
        loop {
            let queue_empty = self.queue.lock().await.is_empty();
            if queue_empty && self.stats.read().processing == 0 {
                return Ok(());
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(PipelineError::Unavailable(
                        "Timeout waiting for generation queue to drain".to_string(),
                    ));
                }
            }

            sleep(IDLE_POLL).await;
        }
    }

    async fn worker_loop(
        worker_id: usize,
        queue: Arc<Mutex<VecDeque<QueuedJob>>>,
        notify: Arc<Notify>,
        runner: Arc<PipelineRunner>,
        running: Arc<RwLock<bool>>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!(worker_id, "Worker started");

        while *running.read() {
            let next = {
                let mut queue_guard = queue.lock().await;
                let next = queue_guard.pop_front();
                if next.is_some() {
                    let mut stats = stats.write();
                    stats.pending = stats.pending.saturating_sub(1);
                    stats.processing += 1;
                }
                next
            };

            let Some(queued) = next else {
                // Wake on new work, or periodically to observe shutdown
                tokio::select! {
                    _ = notify.notified() => continue,
                    _ = sleep(IDLE_POLL) => continue,
                }
            };

            debug!(
                worker_id,
                job_id = %queued.job_id,
                waited_ms = queued.enqueued_at.elapsed().as_millis() as u64,
                "Job dequeued"
            );

            let outcome = runner.run_job(&queued.job_id).await;

            let mut stats = stats.write();
            stats.processing = stats.processing.saturating_sub(1);
            match outcome {
                RunOutcome::Published { .. } => stats.completed += 1,
                RunOutcome::Failed { log, .. } => {
                    stats.failed += 1;
                    if log.is_degraded() {
                        stats.degraded += 1;
                    }
                }
            }
        }

        debug!(worker_id, "Worker stopped");
    }
}
