//! Translation providers and the fallback chain.
//!
//! Cue texts are batched into one newline-joined request to keep round trips
//! down. The chain tries each provider in order and realigns the translated
//! line count to the cue count before writing the texts back; timings are
//! never touched.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::error::{CaptionError, Result};
use crate::subtitle::SubtitleCue;

const SERVICE: &str = "translation";

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Stable provider identifier reported in task results.
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;
}

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CaptionError::Config(format!("Failed to build HTTP client: {}", e)))
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

/// DeepL REST API provider.
pub struct DeepLProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLProvider {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config.deepl_endpoint.clone(),
            api_key: config.deepl_api_key.clone(),
        })
    }
}

#[async_trait]
impl TranslationProvider for DeepLProvider {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(CaptionError::Translation(
                "DeepL API key not configured".to_string(),
            ));
        }

        let url = format!("{}/translate", self.endpoint);
        debug!("Translating with DeepL: {} -> {}", source_lang, target_lang);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("auth_key", self.api_key.as_str()),
                ("text", text),
                ("source_lang", &source_lang.to_uppercase()),
                ("target_lang", &target_lang.to_uppercase()),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Translation(format!(
                "DeepL API error {}: {}",
                status, body
            )));
        }

        let parsed: DeepLResponse = response
            .json()
            .await
            .map_err(|e| CaptionError::MalformedResponse(SERVICE, e.to_string()))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| {
                CaptionError::MalformedResponse(SERVICE, "empty translations array".to_string())
            })
    }
}

/// LibreTranslate provider.
pub struct LibreTranslateProvider {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslateProvider {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config.libretranslate_endpoint.clone(),
        })
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let url = format!("{}/translate", self.endpoint);
        debug!(
            "Translating with LibreTranslate: {} -> {}",
            source_lang, target_lang
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "q": text,
                "source": source_lang,
                "target": target_lang,
                "format": "text",
            }))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Translation(format!(
                "LibreTranslate error {}: {}",
                status, body
            )));
        }

        let parsed: LibreTranslateResponse = response
            .json()
            .await
            .map_err(|e| CaptionError::MalformedResponse(SERVICE, e.to_string()))?;

        Ok(parsed.translated_text)
    }
}

/// Ordered providers tried in sequence until one succeeds.
pub struct FallbackChain {
    providers: Vec<Box<dyn TranslationProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Box<dyn TranslationProvider>>) -> Self {
        Self { providers }
    }

    /// Build the default DeepL-then-LibreTranslate chain. A missing DeepL key
    /// leaves LibreTranslate as the only provider.
    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        let mut providers: Vec<Box<dyn TranslationProvider>> = Vec::new();
        if !config.deepl_api_key.is_empty() {
            providers.push(Box::new(DeepLProvider::new(config)?));
        } else {
            info!("DeepL API key not configured, using LibreTranslate only");
        }
        providers.push(Box::new(LibreTranslateProvider::new(config)?));
        Ok(Self::new(providers))
    }

    /// Translate cue texts in place, preserving count, indices, and timing.
    ///
    /// Returns the name of the provider that produced the result. Failure of
    /// every provider is reported as a single aggregated error and nothing is
    /// written back.
    pub async fn translate_cues(
        &self,
        cues: &mut [SubtitleCue],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<&'static str> {
        if cues.is_empty() {
            return Err(CaptionError::Translation(
                "No subtitle cues to translate".to_string(),
            ));
        }

        let batch = cues
            .iter()
            .map(|cue| cue.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "Translating {} cues ({} chars) from {} to {}",
            cues.len(),
            batch.len(),
            source_lang,
            target_lang
        );

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.translate(&batch, source_lang, target_lang).await {
                Ok(translated) => {
                    apply_translated_lines(cues, &translated);
                    info!("Translation complete using {}", provider.name());
                    return Ok(provider.name());
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(CaptionError::Translation(format!(
            "All translation providers failed ({})",
            failures.join("; ")
        )))
    }
}

/// Write translated lines back onto the cues.
///
/// Translators may merge or split lines; the result is padded with empty
/// strings or truncated to force exact alignment with the cue count.
fn apply_translated_lines(cues: &mut [SubtitleCue], translated: &str) {
    let mut lines: Vec<&str> = translated.split('\n').collect();

    if lines.len() != cues.len() {
        warn!(
            "Translation line count mismatch: {} cues -> {} lines, adjusting",
            cues.len(),
            lines.len()
        );
        lines.resize(cues.len(), "");
    }

    for (cue, line) in cues.iter_mut().zip(lines) {
        cue.text = line.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        reply: std::result::Result<String, String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TranslationProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .map_err(CaptionError::Translation)
        }
    }

    fn cues(texts: &[&str]) -> Vec<SubtitleCue> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| SubtitleCue {
                index: i + 1,
                start_time: i as f64,
                end_time: i as f64 + 0.9,
                text: text.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let secondary_calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            Box::new(StubProvider {
                name: "primary",
                reply: Ok("hola\nmundo".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StubProvider {
                name: "secondary",
                reply: Ok("unused".to_string()),
                calls: Arc::clone(&secondary_calls),
            }),
        ]);

        let mut subtitle = cues(&["hello", "world"]);
        let provider = chain.translate_cues(&mut subtitle, "en", "es").await.unwrap();

        assert_eq!(provider, "primary");
        assert_eq!(subtitle[0].text, "hola");
        assert_eq!(subtitle[1].text, "mundo");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_reports_secondary_and_preserves_count() {
        let chain = FallbackChain::new(vec![
            Box::new(StubProvider {
                name: "primary",
                reply: Err("quota exceeded".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StubProvider {
                name: "secondary",
                reply: Ok("uno\ndos\ntres".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let mut subtitle = cues(&["one", "two", "three"]);
        let original_timing: Vec<(f64, f64)> = subtitle
            .iter()
            .map(|c| (c.start_time, c.end_time))
            .collect();

        let provider = chain.translate_cues(&mut subtitle, "en", "es").await.unwrap();

        assert_eq!(provider, "secondary");
        assert_eq!(subtitle.len(), 3);
        let timing_after: Vec<(f64, f64)> = subtitle
            .iter()
            .map(|c| (c.start_time, c.end_time))
            .collect();
        assert_eq!(original_timing, timing_after);
    }

    #[tokio::test]
    async fn test_both_failing_aggregates_into_one_error() {
        let chain = FallbackChain::new(vec![
            Box::new(StubProvider {
                name: "primary",
                reply: Err("auth".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StubProvider {
                name: "secondary",
                reply: Err("down".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let mut subtitle = cues(&["text"]);
        let original = subtitle[0].text.clone();
        let err = chain
            .translate_cues(&mut subtitle, "en", "es")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("primary"));
        assert!(message.contains("secondary"));
        // Nothing written back on total failure
        assert_eq!(subtitle[0].text, original);
    }

    #[tokio::test]
    async fn test_translated_lines_written_back_verbatim() {
        let chain = FallbackChain::new(vec![Box::new(StubProvider {
            name: "primary",
            reply: Ok("  hola \n\tmundo".to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        })]);

        let mut subtitle = cues(&["hello", "world"]);
        chain.translate_cues(&mut subtitle, "en", "es").await.unwrap();

        assert_eq!(subtitle[0].text, "  hola ");
        assert_eq!(subtitle[1].text, "\tmundo");
    }

    #[tokio::test]
    async fn test_line_count_mismatch_pads_and_truncates() {
        let chain = FallbackChain::new(vec![Box::new(StubProvider {
            name: "primary",
            reply: Ok("only one line".to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        })]);

        let mut subtitle = cues(&["a", "b", "c"]);
        chain.translate_cues(&mut subtitle, "en", "es").await.unwrap();

        assert_eq!(subtitle.len(), 3);
        assert_eq!(subtitle[0].text, "only one line");
        assert_eq!(subtitle[1].text, "");
        assert_eq!(subtitle[2].text, "");

        let chain = FallbackChain::new(vec![Box::new(StubProvider {
            name: "primary",
            reply: Ok("x\ny\nz\nextra".to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        })]);

        let mut subtitle = cues(&["a", "b", "c"]);
        chain.translate_cues(&mut subtitle, "en", "es").await.unwrap();
        assert_eq!(subtitle.len(), 3);
        assert_eq!(subtitle[2].text, "z");
    }
}
