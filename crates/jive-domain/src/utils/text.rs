//! Text utilities for retrieval and previews
//!
//! Token estimation and sentence-aware truncation used by the smart
//! retrieval and matching services.

/// Approximate characters per token for budget math.
pub const CHARS_PER_TOKEN: usize = 4;

/// Marker appended to hard-truncated previews.
pub const TRUNCATION_MARKER: &str = "... [content truncated]";

/// Estimate the token count of `text` as `chars / 4`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Lowercased whitespace tokens of `text`.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Count of whitespace tokens shared between two texts, case-insensitive.
#[must_use]
pub fn shared_token_count(a: &str, b: &str) -> usize {
    let tokens_a: std::collections::HashSet<String> = tokenize(a).into_iter().collect();
    tokenize(b)
        .into_iter()
        .collect::<std::collections::HashSet<String>>()
        .intersection(&tokens_a)
        .count()
}

/// Truncate `text` to at most `max_chars`, preferring a sentence boundary.
///
/// When a sentence terminator falls in the last 30% of the window the cut
/// happens there and the text ends cleanly; otherwise the window is
/// hard-cut and [`TRUNCATION_MARKER`] is appended.
#[must_use]
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_owned();
    }

    let window: String = trimmed.chars().take(max_chars).collect();
    let boundary_floor = max_chars.saturating_mul(7) / 10;

    if let Some(cut) = last_sentence_boundary(&window) {
        if cut >= boundary_floor {
            return window[..cut].trim_end().to_owned();
        }
    }

    format!("{}{}", window.trim_end(), TRUNCATION_MARKER)
}

/// Truncate `text` to an approximate token budget.
#[must_use]
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    truncate_preview(text, max_tokens.saturating_mul(CHARS_PER_TOKEN))
}

/// Byte index just past the last sentence terminator in `window`, if any.
fn last_sentence_boundary(window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .next_back()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens("abcd".repeat(10).as_str()), 10);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate_preview("short text.", 100), "short text.");
    }

    #[test]
    fn cuts_on_late_sentence_boundary() {
        let text = format!("{} End of sentence. trailing words beyond", "x".repeat(80));
        let out = truncate_preview(&text, 100);
        assert!(out.ends_with("End of sentence."));
        assert!(!out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn hard_cut_appends_marker() {
        let text = "word ".repeat(100);
        let out = truncate_preview(&text, 50);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.chars().count() <= 50 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn early_boundary_is_ignored() {
        // Single period at 10% of the window: hard cut wins
        let text = format!("Intro. {}", "y".repeat(200));
        let out = truncate_preview(&text, 100);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn shared_tokens_are_case_insensitive() {
        assert_eq!(
            shared_token_count("Connection Reset by peer", "connection reset error"),
            2
        );
        assert_eq!(shared_token_count("alpha beta", "gamma delta"), 0);
    }
}
