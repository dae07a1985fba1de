//! Caption pipeline orchestrator.
//!
//! Drives one job end to end: cache check, audio handoff, transcription,
//! optional translation, persistence. The orchestrator is the only component
//! that mutates the task registry while a job runs; any step error fails the
//! task with the triggering message and nothing is retried.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache;
use crate::config::SubtitleConfig;
use crate::error::{CaptionError, Result};
use crate::media::AudioExtractor;
use crate::progress::{drive_transcription, ProgressRelay, StagePlan};
use crate::segment::{group_words_into_cues, segments_to_cues};
use crate::subtitle::{cues_to_srt, parse_srt, SubtitleCue};
use crate::task::{TaskRegistry, TaskResult, TaskStage};
use crate::transcribe::{TranscribeMode, TranscribeRequest, Transcriber, TranscriptPayload};
use crate::translate::FallbackChain;

/// All inputs of one caption job, dispatched as a value to a pool worker.
#[derive(Debug, Clone)]
pub struct CaptionJob {
    pub task_id: Uuid,
    pub video_path: PathBuf,
    /// Source-language hint for the recognizer
    pub language: String,
    /// Target language for the subtitle text, when different from source
    pub translate_to: Option<String>,
}

pub struct Orchestrator {
    registry: TaskRegistry,
    transcriber: Arc<dyn Transcriber>,
    translators: Arc<FallbackChain>,
    extractor: Arc<dyn AudioExtractor>,
    subtitle_limits: SubtitleConfig,
    streaming: bool,
}

impl Orchestrator {
    pub fn new(
        registry: TaskRegistry,
        transcriber: Arc<dyn Transcriber>,
        translators: Arc<FallbackChain>,
        extractor: Arc<dyn AudioExtractor>,
        subtitle_limits: SubtitleConfig,
        streaming: bool,
    ) -> Self {
        Self {
            registry,
            transcriber,
            translators,
            extractor,
            subtitle_limits,
            streaming,
        }
    }

    /// Run one job to completion or failure, recording the outcome on the task.
    pub async fn run(&self, job: CaptionJob) {
        info!(
            "Starting caption job {}: {} (language: {}, translate_to: {:?})",
            job.task_id,
            job.video_path.display(),
            job.language,
            job.translate_to
        );

        match self.execute(&job).await {
            Ok(result) => {
                info!(
                    "Caption job {} completed: {}",
                    job.task_id,
                    result.srt_path.display()
                );
                self.registry.complete(job.task_id, result);
            }
            Err(e) => {
                warn!("Caption job {} failed: {}", job.task_id, e);
                self.registry.fail(job.task_id, e.to_string());
            }
        }
    }

    async fn execute(&self, job: &CaptionJob) -> Result<TaskResult> {
        let target_lang = job
            .translate_to
            .clone()
            .unwrap_or_else(|| job.language.clone());

        // Step 1: cache check. An unreadable hit degrades to regeneration.
        if let Some(existing) = cache::find_existing_subtitle(&job.video_path, &target_lang).await {
            match cache::read_subtitle(&existing).await {
                Ok(content) => {
                    info!("Using cached subtitle file: {}", existing.display());
                    return Ok(TaskResult {
                        srt_path: existing,
                        cached: true,
                        translation_provider: None,
                        language: target_lang,
                        cue_count: parse_srt(&content).len(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to read cached subtitle {}, regenerating: {}",
                        existing.display(),
                        e
                    );
                }
            }
        }

        let wants_translation = job
            .translate_to
            .as_ref()
            .is_some_and(|target| target != &job.language);
        // The recognizer's translate task only produces English, so an English
        // target is absorbed into the decoding step.
        let decoder_translate = wants_translation && target_lang == "en";
        let separate_translation = wants_translation && !decoder_translate;

        let plan = StagePlan::new(separate_translation);

        // Step 2: audio handoff. The scratch WAV lives in a guard that
        // removes it on every exit path, including errors.
        self.registry
            .update_progress(job.task_id, plan.extract().start, TaskStage::ExtractingAudio);

        let scratch = tempfile::Builder::new()
            .prefix("auto-caption-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| CaptionError::Media(format!("Failed to create scratch file: {}", e)))?;

        self.extractor
            .extract_audio(&job.video_path, scratch.path())
            .await?;
        self.registry
            .update_progress(job.task_id, plan.extract().end, TaskStage::ExtractingAudio);

        let audio = fs::read(scratch.path()).await?;

        // Step 3: transcription, with streamed progress when available.
        let request = TranscribeRequest {
            audio,
            language: Some(job.language.clone()),
            mode: if decoder_translate {
                TranscribeMode::Translate
            } else {
                TranscribeMode::Transcribe
            },
            correlation_id: Some(job.task_id.to_string()),
        };

        self.registry
            .update_progress(job.task_id, plan.transcribe().start, TaskStage::Transcribing);

        let payload = if self.streaming {
            let events = self.transcriber.transcribe_stream(request).await?;
            let mut relay = ProgressRelay::new(
                self.registry.clone(),
                job.task_id,
                plan.transcribe(),
                TaskStage::Transcribing,
            );
            drive_transcription(events, &mut relay).await?
        } else {
            self.transcriber.transcribe(request).await?
        };

        self.registry
            .update_progress(job.task_id, plan.transcribe().end, TaskStage::Transcribing);

        let source_lang = payload
            .language
            .clone()
            .unwrap_or_else(|| job.language.clone());
        let mut cues = self.payload_to_cues(&payload)?;

        if cues.is_empty() {
            return Err(CaptionError::Transcription(
                "Transcription produced no cues".to_string(),
            ));
        }

        // Step 4: translation, only when a separate phase is planned and the
        // detected source actually differs from the target.
        let mut translation_provider = None;
        if let Some(span) = plan.translate() {
            if source_lang != target_lang {
                self.registry
                    .update_progress(job.task_id, span.start, TaskStage::Translating);

                let provider = self
                    .translators
                    .translate_cues(&mut cues, &source_lang, &target_lang)
                    .await?;
                translation_provider = Some(provider.to_string());

                self.registry
                    .update_progress(job.task_id, span.end, TaskStage::Translating);
            } else {
                info!(
                    "Detected language matches target '{}', skipping translation",
                    target_lang
                );
            }
        }

        // Step 5: persistence.
        self.registry
            .update_progress(job.task_id, plan.save().start, TaskStage::Saving);

        let cue_count = cues.len();
        let srt_content = cues_to_srt(&cues);
        let srt_path = cache::save_subtitle(&job.video_path, &target_lang, &srt_content).await?;

        Ok(TaskResult {
            srt_path,
            cached: false,
            translation_provider,
            language: target_lang,
            cue_count,
        })
    }

    /// Build the cue list from whichever shape the recognizer returned.
    fn payload_to_cues(&self, payload: &TranscriptPayload) -> Result<Vec<SubtitleCue>> {
        if let Some(srt_content) = &payload.srt_content {
            return Ok(parse_srt(srt_content));
        }
        if let Some(words) = &payload.words {
            return Ok(group_words_into_cues(words, &self.subtitle_limits));
        }
        if let Some(segments) = &payload.segments {
            return Ok(segments_to_cues(segments));
        }

        Err(CaptionError::MalformedResponse(
            "recognition",
            "reply carried neither srt_content, words, nor segments".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubtitleConfig;
    use crate::task::TaskStatus;
    use crate::transcribe::{EventStream, ProgressEvent, WordSpan};
    use crate::translate::TranslationProvider;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioExtractor for StubExtractor {
        async fn extract_audio(&self, _video: &std::path::Path, audio: &std::path::Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(audio, b"RIFF fake wav").unwrap();
            Ok(())
        }
    }

    struct StubTranscriber {
        payload: TranscriptPayload,
        calls: AtomicUsize,
        modes: Mutex<Vec<TranscribeMode>>,
        fail_with: Option<String>,
    }

    impl StubTranscriber {
        fn with_words(words: Vec<WordSpan>, language: &str) -> Self {
            Self {
                payload: TranscriptPayload {
                    words: Some(words),
                    language: Some(language.to_string()),
                    ..Default::default()
                },
                calls: AtomicUsize::new(0),
                modes: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, request: TranscribeRequest) -> Result<TranscriptPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(request.mode);
            Ok(self.payload.clone())
        }

        async fn transcribe_stream(&self, request: TranscribeRequest) -> Result<EventStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(request.mode);

            let events: Vec<Result<ProgressEvent>> = if let Some(error) = &self.fail_with {
                vec![Ok(ProgressEvent::Error {
                    error: error.clone(),
                })]
            } else {
                vec![
                    Ok(ProgressEvent::Progress {
                        progress: 0.5,
                        timestamp: 5.0,
                    }),
                    Ok(ProgressEvent::Complete {
                        payload: self.payload.clone(),
                    }),
                ]
            };
            Ok(Box::pin(stream::iter(events)))
        }
    }

    struct StubProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn translate(&self, text: &str, _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .lines()
                .map(|line| format!("[t] {}", line))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    fn ten_second_words() -> Vec<WordSpan> {
        (0..10)
            .map(|n| WordSpan {
                word: format!("word{}", n),
                start: n as f64,
                end: n as f64 + 0.8,
                probability: Some(0.95),
            })
            .collect()
    }

    struct Fixture {
        registry: TaskRegistry,
        orchestrator: Orchestrator,
        transcriber: Arc<StubTranscriber>,
        extractor: Arc<StubExtractor>,
        provider: Arc<StubProvider>,
        _dir: tempfile::TempDir,
        video: PathBuf,
    }

    fn fixture(transcriber: StubTranscriber) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"fake video").unwrap();

        let registry = TaskRegistry::new();
        let transcriber = Arc::new(transcriber);
        let extractor = Arc::new(StubExtractor {
            calls: AtomicUsize::new(0),
        });
        let provider = Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
        });

        struct ArcProvider(Arc<StubProvider>);

        #[async_trait]
        impl TranslationProvider for ArcProvider {
            fn name(&self) -> &'static str {
                self.0.name()
            }
            async fn translate(&self, text: &str, s: &str, t: &str) -> Result<String> {
                self.0.translate(text, s, t).await
            }
        }

        let orchestrator = Orchestrator::new(
            registry.clone(),
            transcriber.clone(),
            Arc::new(FallbackChain::new(vec![Box::new(ArcProvider(
                provider.clone(),
            ))])),
            extractor.clone(),
            SubtitleConfig {
                max_cue_chars: 42,
                max_cue_duration: 5.0,
            },
            true,
        );

        Fixture {
            registry,
            orchestrator,
            transcriber,
            extractor,
            provider,
            _dir: dir,
            video,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_without_target_language() {
        let f = fixture(StubTranscriber::with_words(ten_second_words(), "en"));
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "en".to_string(),
                translate_to: None,
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);

        let result = task.result.unwrap();
        assert!(!result.cached);
        assert!(result.translation_provider.is_none());
        assert_eq!(result.language, "en");

        let content = std::fs::read_to_string(&result.srt_path).unwrap();
        let cues = parse_srt(&content);
        assert!(!cues.is_empty());
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[0].start_time, 0.0);
        assert!(content.starts_with("1\n00:00:00,000 --> "));
    }

    #[tokio::test]
    async fn test_target_equal_to_source_skips_translation() {
        let f = fixture(StubTranscriber::with_words(ten_second_words(), "en"));
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "en".to_string(),
                translate_to: Some("en".to_string()),
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.unwrap().translation_provider.is_none());
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_separate_translation_reports_provider() {
        let f = fixture(StubTranscriber::with_words(ten_second_words(), "en"));
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "en".to_string(),
                translate_to: Some("es".to_string()),
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let result = task.result.unwrap();
        assert_eq!(result.translation_provider.as_deref(), Some("stub"));
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 1);

        let content = std::fs::read_to_string(&result.srt_path).unwrap();
        assert!(content.contains("[t] "));
    }

    #[tokio::test]
    async fn test_english_target_absorbed_into_decoding() {
        let f = fixture(StubTranscriber::with_words(ten_second_words(), "es"));
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "es".to_string(),
                translate_to: Some("en".to_string()),
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.unwrap().translation_provider.is_none());
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *f.transcriber.modes.lock().unwrap(),
            vec![TranscribeMode::Translate]
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_all_services() {
        let f = fixture(StubTranscriber::with_words(ten_second_words(), "en"));
        std::fs::write(
            f.video.with_file_name("clip.en.srt"),
            "1\n00:00:00,000 --> 00:00:01,000\ncached\n\n",
        )
        .unwrap();
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "en".to_string(),
                translate_to: None,
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let result = task.result.unwrap();
        assert!(result.cached);
        assert_eq!(result.cue_count, 1);
        assert_eq!(f.extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.transcriber.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stream_error_fails_task_with_message() {
        let mut transcriber = StubTranscriber::with_words(ten_second_words(), "en");
        transcriber.fail_with = Some("decoder blew up".to_string());
        let f = fixture(transcriber);
        let id = f.registry.create();

        f.orchestrator
            .run(CaptionJob {
                task_id: id,
                video_path: f.video.clone(),
                language: "en".to_string(),
                translate_to: None,
            })
            .await;

        let task = f.registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("decoder blew up"));
    }
}
