//! Assembled assistant message
//!
//! Collects streamed text while it is forwarded to clients and produces the
//! final content/thinking pair that gets persisted.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)<think(?:ing)?>(.*?)</think(?:ing)?>").ok());

/// Finalized assistant reply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinalMessage {
    /// Answer text
    pub content: String,
    /// Reasoning text, if any
    pub thinking: Option<String>,
}

/// Accumulates streamed deltas for one generation
#[derive(Clone, Debug, Default)]
pub struct AssembledMessage {
    content: String,
    thinking: String,
}

impl AssembledMessage {
    /// Start empty
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append answer text
    pub fn push_chunk(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Append reasoning text
    pub fn push_thinking(&mut self, text: &str) {
        self.thinking.push_str(text);
    }

    /// Answer text received so far
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether neither answer nor reasoning text arrived
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.thinking.is_empty()
    }

    /// Produce the persisted form
    ///
    /// When no reasoning was streamed separately, `<think>` / `<thinking>`
    /// blocks embedded in the answer are moved out of it.
    #[must_use]
    pub fn finalize(self) -> FinalMessage {
        let Self { content, thinking } = self;

        if !thinking.trim().is_empty() {
            return FinalMessage {
                content: content.trim().to_string(),
                thinking: Some(thinking.trim().to_string()),
            };
        }

        let (content, extracted) = split_think_blocks(&content);
        FinalMessage {
            content,
            thinking: extracted,
        }
    }
}

/// Split embedded think blocks out of a text
///
/// Returns the remaining text (trimmed) and the block bodies joined by a blank
/// line, or `None` when there were no non-empty blocks.
#[must_use]
pub fn split_think_blocks(text: &str) -> (String, Option<String>) {
    let Some(pattern) = THINK_BLOCK.as_ref().filter(|re| re.is_match(text)) else {
        return (text.trim().to_string(), None);
    };

    let blocks: Vec<&str> = pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    let remaining = pattern.replace_all(text, "").trim().to_string();

    let thinking = (!blocks.is_empty()).then(|| blocks.join("\n\n"));
    (remaining, thinking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_content() {
        let mut message = AssembledMessage::new();
        message.push_chunk("Hello ");
        message.push_chunk("world ");
        assert_eq!(
            message.finalize(),
            FinalMessage {
                content: "Hello world".into(),
                thinking: None
            }
        );
    }

    #[test]
    fn test_streamed_thinking_is_kept_separate() {
        let mut message = AssembledMessage::new();
        message.push_thinking("step 1");
        message.push_chunk("answer <think>not extracted</think>");
        let final_message = message.finalize();
        assert_eq!(final_message.thinking.as_deref(), Some("step 1"));
        assert_eq!(final_message.content, "answer <think>not extracted</think>");
    }

    #[test]
    fn test_embedded_think_blocks_are_extracted() {
        let (content, thinking) =
            split_think_blocks("<think>first</think>Answer.<THINKING>\nsecond\n</THINKING>");
        assert_eq!(content, "Answer.");
        assert_eq!(thinking.as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn test_empty_think_block() {
        let (content, thinking) = split_think_blocks("<think> </think>Only this");
        assert_eq!(content, "Only this");
        assert_eq!(thinking, None);
    }

    #[test]
    fn test_emptiness() {
        let mut message = AssembledMessage::new();
        assert!(message.is_empty());
        message.push_thinking("x");
        assert!(!message.is_empty());
        assert_eq!(message.content(), "");
    }
}
