use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CaptionError, Result};

/// Language codes accepted for transcription and translation requests.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "ja", "pt", "ru", "fr", "de", "nl", "it"];

fn default_max_cue_chars() -> usize {
    42
}

fn default_max_cue_duration() -> f64 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub subtitle: SubtitleConfig,
    pub media: MediaConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Transcription service endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds; long enough for large media
    pub timeout_secs: u64,
    /// Request the streamed progress protocol (NDJSON) instead of a single reply
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// DeepL API key; empty disables the DeepL provider
    pub deepl_api_key: String,
    /// DeepL API endpoint URL
    pub deepl_endpoint: String,
    /// LibreTranslate endpoint URL
    pub libretranslate_endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Maximum characters per cue
    #[serde(default = "default_max_cue_chars")]
    pub max_cue_chars: usize,
    /// Maximum cue duration in seconds
    #[serde(default = "default_max_cue_duration")]
    pub max_cue_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of pool workers executing caption jobs
    pub pool_size: usize,
    /// Maximum number of queued jobs awaiting a worker
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig {
                endpoint: "http://localhost:2800".to_string(),
                timeout_secs: 300,
                streaming: true,
            },
            translate: TranslateConfig {
                deepl_api_key: String::new(),
                deepl_endpoint: "https://api-free.deepl.com/v2".to_string(),
                libretranslate_endpoint: "http://localhost:5000".to_string(),
                timeout_secs: 60,
            },
            subtitle: SubtitleConfig {
                max_cue_chars: default_max_cue_chars(),
                max_cue_duration: default_max_cue_duration(),
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
            },
            worker: WorkerConfig {
                pool_size: 4,
                queue_depth: 32,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaptionError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| CaptionError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CaptionError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CaptionError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Check a language code against the supported set.
pub fn validate_language(code: &str) -> Result<()> {
    if SUPPORTED_LANGUAGES.contains(&code) {
        Ok(())
    } else {
        Err(CaptionError::Validation(format!(
            "Language '{}' not supported. Supported languages: {}",
            code,
            SUPPORTED_LANGUAGES.join(", ")
        )))
    }
}
