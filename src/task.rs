//! Task state machine and concurrency-safe registry.
//!
//! Every caption job is tracked as a [`Task`]. All mutation goes through the
//! [`TaskRegistry`], which guards the whole task map with a single mutex so
//! concurrent readers never observe a partially-updated task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    ExtractingAudio,
    Transcribing,
    Translating,
    Saving,
}

/// Payload recorded on a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Path to the generated subtitle file
    pub srt_path: PathBuf,
    /// Whether the subtitle was served from a pre-existing file
    pub cached: bool,
    /// Translation provider that produced the text, if any
    pub translation_provider: Option<String>,
    /// Language of the subtitle text
    pub language: String,
    /// Number of cues in the subtitle track
    pub cue_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Progress fraction in [0.0, 1.0], monotonically non-decreasing
    pub progress: f64,
    pub stage: Option<TaskStage>,
    pub error: Option<String>,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe store of task state, keyed by task id.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<Uuid, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new queued task and return its id.
    pub fn create(&self) -> Uuid {
        let task_id = Uuid::new_v4();
        let now = Utc::now();

        let task = Task {
            task_id,
            status: TaskStatus::Queued,
            progress: 0.0,
            stage: None,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .insert(task_id, task);

        task_id
    }

    /// Update progress and stage for a running task.
    ///
    /// Unknown ids and tasks already in a terminal state are ignored.
    /// Progress is clamped to [0.0, 1.0] and never moves backward: a lower
    /// value than the stored one leaves the stored value in place.
    pub fn update_progress(&self, task_id: Uuid, progress: f64, stage: TaskStage) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(task) = tasks.get_mut(&task_id) {
            if matches!(task.status, TaskStatus::Completed | TaskStatus::Failed) {
                return;
            }
            task.progress = task.progress.max(progress.clamp(0.0, 1.0));
            task.stage = Some(stage);
            task.status = TaskStatus::Running;
            task.updated_at = Utc::now();
        }
    }

    /// Mark a task as completed with its result payload.
    pub fn complete(&self, task_id: Uuid, result: TaskResult) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(task) = tasks.get_mut(&task_id) {
            task.status = TaskStatus::Completed;
            task.progress = 1.0;
            task.stage = None;
            task.result = Some(result);
            task.error = None;
            task.updated_at = Utc::now();
        }
    }

    /// Mark a task as failed, preserving its last-known progress and stage.
    pub fn fail(&self, task_id: Uuid, error: impl Into<String>) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(task) = tasks.get_mut(&task_id) {
            task.status = TaskStatus::Failed;
            task.error = Some(error.into());
            task.updated_at = Utc::now();
        }
    }

    pub fn get(&self, task_id: Uuid) -> Option<Task> {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .get(&task_id)
            .cloned()
    }

    /// Delete a task. Returns whether it existed.
    pub fn delete(&self, task_id: Uuid) -> bool {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .remove(&task_id)
            .is_some()
    }

    pub fn list(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
