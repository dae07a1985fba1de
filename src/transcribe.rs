//! Transcription service client.
//!
//! Speaks the recognizer's HTTP contract: raw audio bytes in, either a single
//! JSON payload back, or (when a correlation id is supplied) a newline-delimited
//! stream of tagged progress events terminated by exactly one `complete` or
//! `error` event.

use async_trait::async_trait;
use futures::stream::Stream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::config::TranscriberConfig;
use crate::error::{CaptionError, Result};

const SERVICE: &str = "recognition";

/// Decoding task requested from the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscribeMode {
    /// Transcribe in the source language
    Transcribe,
    /// Translate into English while decoding
    Translate,
}

impl TranscribeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscribeMode::Transcribe => "transcribe",
            TranscribeMode::Translate => "translate",
        }
    }
}

/// One recognized word with its time span.
#[derive(Debug, Clone, Deserialize)]
pub struct WordSpan {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub probability: Option<f64>,
}

/// One verbatim recognizer segment.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognizedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Terminal payload of a transcription request.
///
/// Depending on what was asked of the service this carries word-level
/// timestamps, verbatim segments, or ready-made SRT content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptPayload {
    #[serde(default)]
    pub words: Option<Vec<WordSpan>>,
    #[serde(default)]
    pub segments: Option<Vec<RecognizedSegment>>,
    #[serde(default)]
    pub srt_content: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub language_probability: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segment_count: Option<usize>,
}

/// Tagged event on the recognizer's NDJSON progress stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        /// Local fraction in [0, 1]
        progress: f64,
        /// Elapsed media time in seconds
        #[serde(default)]
        timestamp: f64,
    },
    Complete {
        #[serde(flatten)]
        payload: TranscriptPayload,
    },
    Error {
        error: String,
    },
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<ProgressEvent>> + Send>>;

#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub audio: Vec<u8>,
    pub language: Option<String>,
    pub mode: TranscribeMode,
    /// Correlation id the service tags its progress stream with
    pub correlation_id: Option<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio and return the terminal payload in one reply.
    async fn transcribe(&self, request: TranscribeRequest) -> Result<TranscriptPayload>;

    /// Transcribe audio with the streamed progress protocol.
    ///
    /// The returned stream is lazy and finite: it yields `progress` events
    /// until the first terminal event, after which the caller stops pulling.
    async fn transcribe_stream(&self, request: TranscribeRequest) -> Result<EventStream>;
}

/// HTTP implementation of the recognition contract.
pub struct HttpTranscriber {
    client: Client,
    config: TranscriberConfig,
}

impl HttpTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CaptionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn send(&self, request: &TranscribeRequest, streamed: bool) -> Result<reqwest::Response> {
        let url = format!("{}/transcribe/srt", self.config.endpoint);
        let mut builder = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .query(&[("task", request.mode.as_str())])
            .body(request.audio.clone());

        if let Some(language) = &request.language {
            builder = builder.query(&[("language", language.as_str())]);
        }
        if streamed {
            if let Some(correlation_id) = &request.correlation_id {
                builder = builder.query(&[("task_id", correlation_id.as_str())]);
            }
        }

        debug!(
            "Sending transcription request: {} ({} bytes, task={})",
            url,
            request.audio.len(),
            request.mode.as_str()
        );

        let response = builder
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Transcription(format!(
                "Recognition service returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

fn classify_transport_error(error: reqwest::Error) -> CaptionError {
    if error.is_timeout() {
        CaptionError::Timeout(SERVICE, error.to_string())
    } else if error.is_connect() {
        CaptionError::ServiceUnavailable(SERVICE, error.to_string())
    } else {
        CaptionError::Http(error)
    }
}

/// Parse one NDJSON line into an event.
///
/// Blank lines and malformed lines yield `None`; a bad line never aborts
/// the rest of the stream.
pub fn parse_event_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<ProgressEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed progress line: {} ({})", line, e);
            None
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, request: TranscribeRequest) -> Result<TranscriptPayload> {
        let response = self.send(&request, false).await?;

        response
            .json::<TranscriptPayload>()
            .await
            .map_err(|e| CaptionError::MalformedResponse(SERVICE, e.to_string()))
    }

    async fn transcribe_stream(&self, request: TranscribeRequest) -> Result<EventStream> {
        let response = self.send(&request, true).await?;

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::other(e));
        let reader = StreamReader::new(byte_stream);
        let lines = FramedRead::new(reader, LinesCodec::new());

        let events = lines.filter_map(|line| async move {
            match line {
                Ok(line) => parse_event_line(&line).map(Ok),
                Err(e) => Some(Err(CaptionError::Transcription(format!(
                    "Progress stream read failed: {}",
                    e
                )))),
            }
        });

        Ok(Box::pin(events))
    }
}
