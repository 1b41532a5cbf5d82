//! Bounded prompt context from ranked search results.

use tracing::debug;

use crate::document::SearchResult;
use crate::text::{ELLIPSIS, char_len, truncate_chars};

/// Separator placed between context entries.
pub const ENTRY_SEPARATOR: &str = "\n\n";

/// A partial trailing entry is only added when at least this many characters
/// of content still fit.
pub const MIN_PARTIAL_HEADROOM: usize = 100;

/// Builds the context block handed to the answer generator.
///
/// Each result becomes one entry, `"Source: {source}\n{content}"`, and entries
/// are joined with a blank line in rank order. The budget counts every
/// character of the output (headers and separators included), so the result
/// is never longer than `max_length` plus one [`ELLIPSIS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Greedily pack `results` into at most `max_length` characters.
    ///
    /// When the next entry does not fit but at least [`MIN_PARTIAL_HEADROOM`]
    /// characters of its content would, a truncated copy ending in `...` is
    /// added as the final entry. Otherwise packing stops before it.
    pub fn build(&self, results: &[SearchResult], max_length: usize) -> String {
        let mut context = String::new();
        let mut used = 0;
        let mut included = 0;

        for result in results {
            let header = format!("Source: {}\n", result.chunk.source());
            let separator = if context.is_empty() { 0 } else { char_len(ENTRY_SEPARATOR) };
            let content = &result.chunk.content;
            let entry_len = char_len(&header) + char_len(content);

            if used + separator + entry_len <= max_length {
                push_entry(&mut context, &header, content);
                used += separator + entry_len;
                included += 1;
                continue;
            }

            let headroom = max_length.saturating_sub(used + separator + char_len(&header));
            if headroom >= MIN_PARTIAL_HEADROOM {
                let partial = format!("{}{ELLIPSIS}", truncate_chars(content, headroom));
                push_entry(&mut context, &header, &partial);
                included += 1;
                debug!(headroom, "added truncated context entry");
            }
            break;
        }

        debug!(included, total = results.len(), chars = char_len(&context), "assembled context");
        context
    }
}

fn push_entry(context: &mut String, header: &str, content: &str) {
    if !context.is_empty() {
        context.push_str(ENTRY_SEPARATOR);
    }
    context.push_str(header);
    context.push_str(content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn result(source: &str, content: &str) -> SearchResult {
        SearchResult { chunk: Chunk::new(content).with_source(source), similarity_score: 0.9 }
    }

    #[test]
    fn joins_entries_with_source_headers() {
        let ctx = ContextAssembler::new()
            .build(&[result("a.csv", "first"), result("b.csv", "second")], 4000);
        assert_eq!(ctx, "Source: a.csv\nfirst\n\nSource: b.csv\nsecond");
    }

    #[test]
    fn missing_source_is_labelled_unknown() {
        let r = SearchResult { chunk: Chunk::new("text"), similarity_score: 0.8 };
        assert_eq!(ContextAssembler::new().build(&[r], 100), "Source: Unknown\ntext");
    }

    #[test]
    fn truncates_last_entry_when_headroom_allows() {
        let ctx = ContextAssembler::new()
            .build(&[result("a", &"x".repeat(50)), result("b", &"y".repeat(500))], 300);
        assert!(ctx.ends_with(ELLIPSIS));
        assert!(ctx.contains("Source: b\n"));
        assert_eq!(char_len(&ctx), 303);
    }

    #[test]
    fn stops_when_headroom_is_too_small() {
        let ctx = ContextAssembler::new()
            .build(&[result("a", &"x".repeat(150)), result("b", &"y".repeat(500))], 200);
        assert_eq!(ctx, format!("Source: a\n{}", "x".repeat(150)));
    }

    #[test]
    fn empty_results_give_empty_context() {
        assert_eq!(ContextAssembler::new().build(&[], 4000), "");
    }
}
