//! SRT subtitle codec.
//!
//! Serializes cue lists to the standard SRT block format and parses them
//! back. Malformed blocks are skipped during parsing rather than aborting
//! the whole file.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CaptionError, Result};

/// One displayed subtitle line with fixed timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    /// 1-based sequence number, strictly increasing within a track
    pub index: usize,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds, greater than start_time
    pub end_time: f64,
    pub text: String,
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm).
///
/// Sub-millisecond remainders are truncated, not rounded.
pub fn format_timestamp(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT timestamp (HH:MM:SS,mmm) to seconds.
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let normalized = timestamp.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 3 {
        return Err(CaptionError::Subtitle(format!(
            "Invalid timestamp: {}",
            timestamp
        )));
    }

    let hours: f64 = parts[0]
        .parse()
        .map_err(|_| CaptionError::Subtitle(format!("Invalid hours in timestamp: {}", timestamp)))?;
    let minutes: f64 = parts[1].parse().map_err(|_| {
        CaptionError::Subtitle(format!("Invalid minutes in timestamp: {}", timestamp))
    })?;
    let seconds: f64 = parts[2].parse().map_err(|_| {
        CaptionError::Subtitle(format!("Invalid seconds in timestamp: {}", timestamp))
    })?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Serialize cues to SRT text, in index order.
pub fn cues_to_srt(cues: &[SubtitleCue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_timestamp(cue.start_time),
            format_timestamp(cue.end_time),
            cue.text
        ));
    }

    srt_content
}

/// Parse SRT text into cues.
///
/// Blocks with fewer than three lines or an unparsable index/timing line
/// are skipped; the remaining blocks still parse.
pub fn parse_srt(content: &str) -> Vec<SubtitleCue> {
    let mut cues = Vec::new();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.trim().split("\n\n") {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 3 {
            continue;
        }

        let index: usize = match lines[0].trim().parse() {
            Ok(idx) => idx,
            Err(_) => {
                warn!("Skipping SRT block with invalid index: {}", lines[0]);
                continue;
            }
        };

        let mut timing = lines[1].splitn(2, " --> ");
        let (start, end) = match (timing.next(), timing.next()) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                warn!("Skipping SRT block with invalid timing line: {}", lines[1]);
                continue;
            }
        };

        let (start_time, end_time) = match (parse_timestamp(start), parse_timestamp(end)) {
            (Ok(start), Ok(end)) => (start, end),
            _ => {
                warn!("Skipping SRT block with unparsable timestamps: {}", lines[1]);
                continue;
            }
        };

        cues.push(SubtitleCue {
            index,
            start_time,
            end_time,
            text: lines[2..].join("\n"),
        });
    }

    cues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(65.123), "00:01:05,123");
        assert_eq!(format_timestamp(3725.4), "01:02:05,400");
    }

    #[test]
    fn test_format_timestamp_truncates_sub_millisecond() {
        assert_eq!(format_timestamp(1.2349), "00:00:01,234");
    }

    #[test]
    fn test_parse_timestamp() {
        assert!((parse_timestamp("01:02:05,400").unwrap() - 3725.4).abs() < 1e-9);
        assert!((parse_timestamp("00:00:00,000").unwrap()).abs() < 1e-9);
        assert!(parse_timestamp("garbage").is_err());
        assert!(parse_timestamp("01:02").is_err());
    }

    #[test]
    fn test_round_trip() {
        let cues = vec![
            SubtitleCue {
                index: 1,
                start_time: 0.0,
                end_time: 2.5,
                text: "hello world".to_string(),
            },
            SubtitleCue {
                index: 2,
                start_time: 2.5,
                end_time: 5.125,
                text: "two\nlines".to_string(),
            },
        ];

        let parsed = parse_srt(&cues_to_srt(&cues));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], cues[0]);
        assert_eq!(parsed[1].index, 2);
        assert!((parsed[1].start_time - 2.5).abs() < 1e-9);
        assert!((parsed[1].end_time - 5.125).abs() < 1e-9);
        assert_eq!(parsed[1].text, "two\nlines");
    }

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let content = "1\n00:00:00,000 --> 00:00:01,000\nfirst\n\n\
                       not-a-number\n00:00:01,000 --> 00:00:02,000\nbad index\n\n\
                       3\nno arrow here\nbad timing\n\n\
                       4\n00:00:03,000 --> 00:00:04,000\nlast";
        let cues = parse_srt(content);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first");
        assert_eq!(cues[1].index, 4);
        assert_eq!(cues[1].text, "last");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_srt("").is_empty());
        assert!(parse_srt("   \n\n  ").is_empty());
    }
}
