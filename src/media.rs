//! Audio extraction collaborator.
//!
//! The recognizer wants 16 kHz mono PCM WAV; extraction runs through an
//! ffmpeg subprocess. The pipeline owns the scratch file's lifetime.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{CaptionError, Result};

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract the video's audio track into `audio_path` as 16 kHz mono WAV.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;
}

/// FFmpeg-based extractor.
pub struct FfmpegExtractor {
    binary_path: String,
}

impl FfmpegExtractor {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            binary_path: config.binary_path.clone(),
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!(
            "Extracting audio from {} to {}",
            video_path.display(),
            audio_path.display()
        );

        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-i")
            .arg(video_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg("16000")
            .arg("-f")
            .arg("wav")
            .arg("-y")
            .arg(audio_path);

        debug!("Executing: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| CaptionError::Media(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptionError::Media(format!(
                "Audio extraction failed: {}",
                stderr
            )));
        }

        info!("Audio extraction completed");
        Ok(())
    }
}
