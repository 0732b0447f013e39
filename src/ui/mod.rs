//! Terminal front ends.
//!
//! - `search` - form-style client of the query API
//! - `admin` - index console talking to the search index directly

pub mod admin;
pub mod search;

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Shorten `text` to `max_chars`, cutting at the last space and appending `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head = preview(text, max_chars);
    let cut = match head.rsplit_once(' ') {
        Some((before, _)) => before,
        None => head.as_str(),
    };
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_truncate_cuts_at_word_boundary() {
        assert_eq!(truncate_text("the quick brown fox", 12), "the quick...");
    }

    #[test]
    fn test_truncate_without_spaces() {
        assert_eq!(truncate_text("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("grüße", 3), "grü");
    }
}
