//! Cue segmentation engine.
//!
//! Groups time-stamped words from the recognizer into display-ready subtitle
//! cues under a character budget and a duration budget.

use tracing::debug;

use crate::config::SubtitleConfig;
use crate::subtitle::SubtitleCue;
use crate::transcribe::{RecognizedSegment, WordSpan};

/// Greedily accumulate words into cues.
///
/// A word joins the current cue while the joined text stays within
/// `max_cue_chars` and the elapsed span stays within `max_cue_duration`.
/// The first violating word closes the cue and seeds the next one. Budgets
/// are only checked against cues that already hold a word, so a single
/// oversized word still lands whole in its own cue.
pub fn group_words_into_cues(words: &[WordSpan], limits: &SubtitleConfig) -> Vec<SubtitleCue> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut cues = Vec::new();
    let mut current_text: Vec<&str> = Vec::new();
    let mut current_start = words[0].start;
    let mut current_length = 0usize;
    let mut cue_index = 1usize;

    for (i, word) in words.iter().enumerate() {
        // Budget is in characters, not bytes; multi-byte scripts would
        // otherwise exhaust it several times faster.
        let word_length = word.word.chars().count();
        let space = if current_text.is_empty() { 0 } else { 1 };
        let next_length = current_length + space + word_length;
        let duration = word.end - current_start;

        if !current_text.is_empty()
            && (next_length > limits.max_cue_chars || duration > limits.max_cue_duration)
        {
            cues.push(SubtitleCue {
                index: cue_index,
                start_time: current_start,
                end_time: words[i - 1].end,
                text: current_text.join(" "),
            });

            cue_index += 1;
            current_text = vec![word.word.as_str()];
            current_start = word.start;
            current_length = word_length;
        } else {
            current_text.push(word.word.as_str());
            current_length = next_length;
        }
    }

    if !current_text.is_empty() {
        cues.push(SubtitleCue {
            index: cue_index,
            start_time: current_start,
            end_time: words[words.len() - 1].end,
            text: current_text.join(" "),
        });
    }

    debug!("Grouped {} words into {} subtitle cues", words.len(), cues.len());
    cues
}

/// Map verbatim recognizer segments one-to-one onto cues.
pub fn segments_to_cues(segments: &[RecognizedSegment]) -> Vec<SubtitleCue> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| SubtitleCue {
            index: i + 1,
            start_time: segment.start,
            end_time: segment.end,
            text: segment.text.trim().to_string(),
        })
        .collect()
}
