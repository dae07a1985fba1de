//! Subtitle file conventions and cache lookup.
//!
//! Generated subtitles are saved as `{video-basename}.{lang}.srt` next to the
//! source video. A file already matching that convention (or a relaxed
//! variant with a trailing descriptor segment, e.g. `movie.en.forced.srt`)
//! counts as a cache hit and short-circuits the whole pipeline.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{CaptionError, Result};

/// Validate that the source video exists and is a readable file.
pub fn validate_video_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CaptionError::FileNotFound(path.display().to_string()));
    }
    if !path.is_file() {
        return Err(CaptionError::Validation(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    std::fs::File::open(path).map_err(|e| {
        CaptionError::Validation(format!("Video file is not readable: {}: {}", path.display(), e))
    })?;

    Ok(())
}

/// Conventional output path: `{video-basename}.{lang}.srt` beside the video.
pub fn subtitle_path(video_path: &Path, language: &str) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = video_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}.{}.srt", stem, language))
}

/// Whether `file_name` is a subtitle for `stem` in `language`.
///
/// Accepts the plain `{stem}.{lang}.srt` form and relaxed variants with
/// extra descriptor segments between the language code and the extension.
/// The stem must be followed by a `.`, so a longer sibling stem such as
/// `movie2` never claims `movie`'s subtitles.
fn matches_subtitle_name(file_name: &str, stem: &str, language: &str) -> bool {
    let name = file_name.to_lowercase();
    let stem = stem.to_lowercase();
    let language = language.to_lowercase();

    let Some(rest) = name.strip_prefix(&stem) else {
        return false;
    };
    let Some(middle) = rest.strip_suffix(".srt") else {
        return false;
    };
    if !middle.starts_with('.') {
        return false;
    }

    let tail = format!("{}.", middle);
    tail.contains(&format!(".{}.", language)) || tail.contains(&format!(".{}lish.", language))
}

/// Look for an existing subtitle file matching the video and language.
pub async fn find_existing_subtitle(video_path: &Path, language: &str) -> Option<PathBuf> {
    let stem = video_path.file_stem()?.to_string_lossy().to_string();
    let dir = video_path.parent().unwrap_or_else(|| Path::new("."));

    let mut entries = fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if matches_subtitle_name(&file_name, &stem, language) {
            let path = entry.path();
            debug!("Found existing subtitle file: {}", path.display());
            return Some(path);
        }
    }

    None
}

/// Write subtitle content to the conventional path and return it.
pub async fn save_subtitle(video_path: &Path, language: &str, content: &str) -> Result<PathBuf> {
    let path = subtitle_path(video_path, language);
    fs::write(&path, content).await?;
    info!("Subtitle file saved: {}", path.display());
    Ok(path)
}

pub async fn read_subtitle(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path).await?)
}
