//! Character-boundary string helpers.

/// Marker appended to text that was cut short.
pub const ELLIPSIS: &str = "...";

/// The first `max_chars` characters of `text` (never splits a code point).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// `text` cut to `max_chars` characters with [`ELLIPSIS`] appended, or `text`
/// unchanged when it already fits.
pub fn preview(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    if head.len() == text.len() { text.to_string() } else { format!("{head}{ELLIPSIS}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn preview_only_marks_cut_text() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
