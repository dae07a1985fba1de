//! Job submission and task status surface.
//!
//! [`CaptionService`] wires the pipeline components together and exposes the
//! operations a frontend needs: submit a job (validated, queued, id returned
//! immediately), poll task status, and housekeeping (list/delete). Transport
//! routing is left to the embedder; the shipped CLI is one such frontend.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::cache;
use crate::config::{validate_language, Config};
use crate::error::Result;
use crate::media::FfmpegExtractor;
use crate::pipeline::{CaptionJob, Orchestrator};
use crate::task::{Task, TaskRegistry, TaskStatus};
use crate::transcribe::HttpTranscriber;
use crate::translate::FallbackChain;
use crate::worker::WorkerPool;

/// A caption job as submitted by a caller.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub video_path: PathBuf,
    /// Source language code
    pub language: String,
    /// Optional target language for translated subtitles
    pub translate_to: Option<String>,
}

/// Reply to a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct TaskTicket {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

pub struct CaptionService {
    registry: TaskRegistry,
    pool: WorkerPool,
}

impl CaptionService {
    /// Build the service with HTTP-backed transcription and translation.
    pub fn new(config: &Config) -> Result<Self> {
        let registry = TaskRegistry::new();
        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            Arc::new(HttpTranscriber::new(config.transcriber.clone())?),
            Arc::new(FallbackChain::from_config(&config.translate)?),
            Arc::new(FfmpegExtractor::new(&config.media)),
            config.subtitle.clone(),
            config.transcriber.streaming,
        ));
        let pool = WorkerPool::spawn(
            orchestrator,
            config.worker.pool_size,
            config.worker.queue_depth,
        );

        Ok(Self::from_parts(registry, pool))
    }

    /// Assemble from pre-built parts. Useful for embedders supplying their
    /// own service implementations.
    pub fn from_parts(registry: TaskRegistry, pool: WorkerPool) -> Self {
        Self { registry, pool }
    }

    /// Validate and enqueue a job, returning its task id immediately.
    ///
    /// Validation failures surface here and the job is never queued.
    pub fn submit(&self, request: CaptionRequest) -> Result<TaskTicket> {
        cache::validate_video_path(&request.video_path)?;
        validate_language(&request.language)?;
        if let Some(target) = &request.translate_to {
            validate_language(target)?;
        }

        let task_id = self.registry.create();
        let job = CaptionJob {
            task_id,
            video_path: request.video_path,
            language: request.language,
            translate_to: request.translate_to,
        };

        if let Err(e) = self.pool.submit(job) {
            self.registry.delete(task_id);
            return Err(e);
        }

        info!("Caption task {} queued", task_id);
        Ok(TaskTicket {
            task_id,
            status: TaskStatus::Queued,
        })
    }

    pub fn status(&self, task_id: Uuid) -> Option<Task> {
        self.registry.get(task_id)
    }

    pub fn delete_task(&self, task_id: Uuid) -> bool {
        self.registry.delete(task_id)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.registry.list()
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}
