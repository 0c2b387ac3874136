//! Text helpers shared by the prompt assembler.

use crate::constants::prompts::{HASH_ANSWER_MARKER, HIGHLIGHT_MARKER};

/// Ground truth following the first `####` marker, trimmed.
///
/// When several markers are present only the first segment after the
/// first marker is returned.
pub fn extract_hash_answer(text: &str) -> Option<String> {
    let mut segments = text.split(HASH_ANSWER_MARKER);
    segments.next()?;
    segments.next().map(|segment| segment.trim().to_string())
}

/// Text following the first single-line `**heading**`, up to the next blank line.
pub fn extract_highlight(text: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(open) = text[search_from..].find(HIGHLIGHT_MARKER) {
        let heading_start = search_from + open + HIGHLIGHT_MARKER.len();
        let line_end = text[heading_start..]
            .find('\n')
            .map_or(text.len(), |offset| heading_start + offset);
        if let Some(close) = text[heading_start..line_end].find(HIGHLIGHT_MARKER) {
            let body = text[heading_start + close + HIGHLIGHT_MARKER.len()..].trim_start();
            let end = body.find("\n\n").unwrap_or(body.len());
            return Some(body[..end].trim().to_string());
        }
        search_from = heading_start;
    }
    None
}
