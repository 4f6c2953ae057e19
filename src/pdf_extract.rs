use anyhow::{Context, Result};
use lopdf::Document;

/// Pages sampled for AI summary generation.
pub const SUMMARY_PAGE_COUNT: usize = 5;

/// Characters of extracted text fed into the summary prompt.
pub const SUMMARY_EXCERPT_CHARS: usize = 4000;

/// Extract plain text from the first `max_pages` pages of a PDF held in
/// memory.
pub fn first_pages_text(bytes: &[u8], max_pages: usize) -> Result<String> {
    let doc = Document::load_mem(bytes).context("failed to parse pdf")?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().take(max_pages).collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    doc.extract_text(&pages).context("failed to extract pdf text")
}

/// Clip text to at most `max_chars` characters on a character boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_clips_long_text() {
        let text = "x".repeat(50);
        assert_eq!(excerpt(&text, 10).len(), 10);
    }

    #[test]
    fn test_excerpt_keeps_short_text() {
        assert_eq!(excerpt("short", 4000), "short");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "héllo wörld";
        let clipped = excerpt(text, 3);
        assert_eq!(clipped, "hél");
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        assert!(first_pages_text(b"not a pdf", SUMMARY_PAGE_COUNT).is_err());
    }
}
