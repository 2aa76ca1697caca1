//! Prompt assembly
//!
//! Builds the single text prompt sent upstream:
//!
//! ```text
//! <system preamble>
//!
//! Answer the user's question using the following search results:   (optional)
//! 1. Title
//!    body
//!    Link: https://...
//!
//! Conversation history:                                              (optional)
//! User: ...
//! Assistant: ...
//!
//! User: <current message>
//! Assistant:
//! ```

use std::fmt::Write as _;

use crate::messages::SearchResult;
use crate::store::ConversationTurn;

/// Header introducing the search context block
pub const SEARCH_CONTEXT_HEADER: &str = "Answer the user's question using the following search results:";

/// Header introducing the history block
pub const HISTORY_HEADER: &str = "Conversation history:";

/// Pure, deterministic prompt builder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptAssembler {
    system_preamble: String,
    history_window: usize,
}

impl PromptAssembler {
    /// Create an assembler keeping at most `history_window` prior turns
    pub fn new(system_preamble: impl Into<String>, history_window: usize) -> Self {
        Self {
            system_preamble: system_preamble.into(),
            history_window,
        }
    }

    /// Number of prior turns kept
    #[must_use]
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Assemble the prompt
    ///
    /// `history` is oldest first and must not contain the current message.
    #[must_use]
    pub fn assemble(
        &self,
        history: &[ConversationTurn],
        current_message: &str,
        search_context: Option<&str>,
    ) -> String {
        let mut prompt = String::with_capacity(
            self.system_preamble.len() + current_message.len() + 256,
        );

        prompt.push_str(self.system_preamble.trim_end());
        prompt.push_str("\n\n");

        if let Some(context) = search_context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str(SEARCH_CONTEXT_HEADER);
            prompt.push('\n');
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }

        let window = &history[history.len().saturating_sub(self.history_window)..];
        if !window.is_empty() {
            prompt.push_str(HISTORY_HEADER);
            prompt.push('\n');
            for turn in window {
                let _ = writeln!(prompt, "{}: {}", turn.role.label(), turn.content);
            }
            prompt.push('\n');
        }

        let _ = write!(prompt, "User: {current_message}\nAssistant:");
        prompt
    }
}

/// Render search results as a numbered context block
#[must_use]
pub fn format_search_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (idx, result) in results.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", idx + 1, result.title);
        let body = result.body().trim();
        if !body.is_empty() {
            let _ = writeln!(out, "   {body}");
        }
        if result.is_citable() {
            if let Some(url) = result.url.as_deref() {
                let _ = writeln!(out, "   Link: {}", url.trim());
            }
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assembler(window: usize) -> PromptAssembler {
        PromptAssembler::new("Be helpful.", window)
    }

    #[test]
    fn test_no_history_no_search() {
        let prompt = assembler(10).assemble(&[], "Hi", None);
        assert_eq!(prompt, "Be helpful.\n\nUser: Hi\nAssistant:");
    }

    #[test]
    fn test_history_rendered_oldest_first() {
        let history = vec![
            ConversationTurn::user("What is Rust?"),
            ConversationTurn::assistant("A language."),
        ];
        let prompt = assembler(10).assemble(&history, "Is it fast?", None);
        assert_eq!(
            prompt,
            "Be helpful.\n\n\
             Conversation history:\n\
             User: What is Rust?\n\
             Assistant: A language.\n\n\
             User: Is it fast?\nAssistant:"
        );
    }

    #[test]
    fn test_history_window_keeps_latest_turns() {
        let history: Vec<ConversationTurn> = (1..=5)
            .map(|i| ConversationTurn::user(format!("q{i}")))
            .collect();
        let prompt = assembler(2).assemble(&history, "now", None);
        assert!(!prompt.contains("q3"));
        assert!(prompt.contains("User: q4\nUser: q5\n\nUser: now"));
    }

    #[test]
    fn test_zero_window_omits_history() {
        let history = vec![ConversationTurn::user("old")];
        let prompt = assembler(0).assemble(&history, "new", None);
        assert!(!prompt.contains(HISTORY_HEADER));
        assert!(!prompt.contains("old"));
    }

    #[test]
    fn test_search_context_comes_before_history() {
        let history = vec![ConversationTurn::user("earlier")];
        let prompt = assembler(10).assemble(&history, "news?", Some("1. Headline"));
        let search_at = prompt.find(SEARCH_CONTEXT_HEADER).unwrap();
        let history_at = prompt.find(HISTORY_HEADER).unwrap();
        assert!(search_at < history_at);
        assert!(prompt.ends_with("User: news?\nAssistant:"));
    }

    #[test]
    fn test_blank_search_context_is_omitted() {
        let prompt = assembler(10).assemble(&[], "q", Some("   "));
        assert!(!prompt.contains(SEARCH_CONTEXT_HEADER));
    }

    #[test]
    fn test_deterministic() {
        let history = vec![ConversationTurn::assistant("x")];
        let a = assembler(3).assemble(&history, "y", Some("ctx"));
        let b = assembler(3).assemble(&history, "y", Some("ctx"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_format_search_results() {
        let results = vec![
            SearchResult {
                title: "AI summary".into(),
                url: None,
                snippet: String::new(),
                content: Some("Short answer.".into()),
                score: None,
            },
            SearchResult::new("Rust 2024", "https://blog.rust-lang.org", "Edition news"),
        ];
        assert_eq!(
            format_search_results(&results),
            "1. AI summary\n   Short answer.\n\n2. Rust 2024\n   Edition news\n   Link: https://blog.rust-lang.org"
        );
    }
}
