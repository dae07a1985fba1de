//! Stage weighting and progress relay.
//!
//! Each pipeline phase owns a fixed share of the job's progress mass. The
//! relay remaps the recognizer's self-reported local fraction into the
//! phase's global interval and forwards it to the task registry, never
//! letting progress move backward.

use futures::StreamExt;
use uuid::Uuid;

use crate::error::{CaptionError, Result};
use crate::task::{TaskRegistry, TaskStage};
use crate::transcribe::{EventStream, ProgressEvent, TranscriptPayload};

/// Share of total progress reserved for audio extraction.
pub const EXTRACT_WEIGHT: f64 = 0.10;
/// Share reserved for transcription when translation runs as its own phase.
pub const TRANSCRIBE_WEIGHT: f64 = 0.65;
/// Enlarged transcription share when translation is absorbed or skipped.
pub const TRANSCRIBE_WEIGHT_ABSORBED: f64 = 0.85;
/// Share reserved for the separate translation phase.
pub const TRANSLATE_WEIGHT: f64 = 0.20;
/// Share reserved for persistence.
pub const SAVE_WEIGHT: f64 = 0.05;

/// Global progress interval reserved for one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    /// Map a local fraction in [0, 1] into this interval.
    pub fn global(&self, fraction: f64) -> f64 {
        self.start + fraction.clamp(0.0, 1.0) * (self.end - self.start)
    }
}

/// Fixed schedule of phase intervals for one job.
#[derive(Debug, Clone, Copy)]
pub struct StagePlan {
    extract: Span,
    transcribe: Span,
    translate: Option<Span>,
    save: Span,
}

impl StagePlan {
    /// Build the schedule. `separate_translation` is true when translation
    /// runs as its own phase after transcription; otherwise its share is
    /// folded into the transcription phase.
    pub fn new(separate_translation: bool) -> Self {
        let transcribe_weight = if separate_translation {
            TRANSCRIBE_WEIGHT
        } else {
            TRANSCRIBE_WEIGHT_ABSORBED
        };

        let extract = Span {
            start: 0.0,
            end: EXTRACT_WEIGHT,
        };
        let transcribe = Span {
            start: extract.end,
            end: extract.end + transcribe_weight,
        };
        let translate = separate_translation.then(|| Span {
            start: transcribe.end,
            end: transcribe.end + TRANSLATE_WEIGHT,
        });
        let save_start = translate.map(|s| s.end).unwrap_or(transcribe.end);
        let save = Span {
            start: save_start,
            end: save_start + SAVE_WEIGHT,
        };

        Self {
            extract,
            transcribe,
            translate,
            save,
        }
    }

    pub fn extract(&self) -> Span {
        self.extract
    }

    pub fn transcribe(&self) -> Span {
        self.transcribe
    }

    pub fn translate(&self) -> Option<Span> {
        self.translate
    }

    pub fn save(&self) -> Span {
        self.save
    }
}

/// Remaps a phase-local progress fraction into the job's global progress.
pub struct ProgressRelay {
    registry: TaskRegistry,
    task_id: Uuid,
    span: Span,
    stage: TaskStage,
    last_applied: f64,
}

impl ProgressRelay {
    pub fn new(registry: TaskRegistry, task_id: Uuid, span: Span, stage: TaskStage) -> Self {
        Self {
            registry,
            task_id,
            span,
            stage,
            last_applied: span.start,
        }
    }

    /// Apply a local fraction reported mid-stream.
    ///
    /// Non-monotonic reports are tolerated: when the computed global value is
    /// lower than the last applied one, the last applied value wins.
    pub fn on_local_progress(&mut self, fraction: f64) {
        let global = self.span.global(fraction);
        if global > self.last_applied {
            self.last_applied = global;
        }
        self.registry
            .update_progress(self.task_id, self.last_applied, self.stage);
    }

    pub fn last_applied(&self) -> f64 {
        self.last_applied
    }
}

/// Pump a recognizer event stream through the relay until its terminal event.
///
/// Stream termination without a `complete` or `error` event is a failure.
pub async fn drive_transcription(
    mut events: EventStream,
    relay: &mut ProgressRelay,
) -> Result<TranscriptPayload> {
    while let Some(event) = events.next().await {
        match event? {
            ProgressEvent::Progress { progress, .. } => relay.on_local_progress(progress),
            ProgressEvent::Complete { payload } => return Ok(payload),
            ProgressEvent::Error { error } => return Err(CaptionError::Transcription(error)),
        }
    }

    Err(CaptionError::Transcription(
        "Progress stream ended without a terminal event".to_string(),
    ))
}
