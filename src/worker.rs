//! Bounded worker pool.
//!
//! A fixed number of workers drain a bounded queue of caption jobs. Jobs are
//! self-contained values; all shared state lives in the task registry. Once a
//! job is picked up it runs to completion or failure, never cancelled.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{CaptionError, Result};
use crate::pipeline::{CaptionJob, Orchestrator};

pub struct WorkerPool {
    job_tx: mpsc::Sender<CaptionJob>,
}

impl WorkerPool {
    /// Spawn `pool_size` workers sharing one receiver.
    pub fn spawn(orchestrator: Arc<Orchestrator>, pool_size: usize, queue_depth: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<CaptionJob>(queue_depth.max(1));
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

        for worker_id in 0..pool_size.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let orchestrator = Arc::clone(&orchestrator);

            tokio::spawn(async move {
                info!("Caption worker {} started", worker_id);
                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };

                    let Some(job) = job else {
                        debug!("Caption worker {} shutting down (queue closed)", worker_id);
                        break;
                    };

                    debug!("Worker {} picked up task {}", worker_id, job.task_id);
                    orchestrator.run(job).await;
                }
            });
        }

        Self { job_tx }
    }

    /// Enqueue a job without blocking. A full queue is a submission error.
    pub fn submit(&self, job: CaptionJob) -> Result<()> {
        self.job_tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => CaptionError::Validation(format!(
                "Job queue is full, rejecting task {}",
                job.task_id
            )),
            mpsc::error::TrySendError::Closed(_) => {
                CaptionError::Config("Worker pool is shut down".to_string())
            }
        })
    }
}
