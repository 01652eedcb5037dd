//! Prompt templates for the two generation paths.

/// Grounded prompt: answer strictly from the retrieved context.
pub fn rag_prompt(rag_answer: &str, user_message: &str) -> String {
    format!("Context:\n{rag_answer}\n\nQuestion: {user_message}\nAnswer (use only the context):")
}

/// Conversational prompt with a short context preamble.
pub fn fallback_prompt(short_context: &str, user_message: &str) -> String {
    format!("{short_context}\nUser: {user_message}\nRespond conversationally.")
}

/// The conversation summary when present, else the head of the retrieved
/// context truncated to `max_chars` characters.
pub fn short_context(summary: &str, rag_answer: &str, max_chars: usize) -> String {
    if !summary.is_empty() {
        return summary.to_owned();
    }
    rag_answer.chars().take(max_chars).collect()
}

/// Fold the trailing `turns` history lines into a summary block.
pub fn summarize_history(history: &[String], turns: usize) -> String {
    if turns == 0 || history.is_empty() {
        return String::new();
    }
    let start = history.len().saturating_sub(turns);
    format!("Recent conversation:\n{}", history[start..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_prompt_layout() {
        assert_eq!(
            rag_prompt("ctx", "why?"),
            "Context:\nctx\n\nQuestion: why?\nAnswer (use only the context):"
        );
    }

    #[test]
    fn short_context_prefers_summary() {
        assert_eq!(short_context("sum", "rag", 300), "sum");
        assert_eq!(short_context("", "abcdef", 3), "abc");
        // Multi-byte text is cut on char boundaries.
        assert_eq!(short_context("", "ééé", 2), "éé");
    }

    #[test]
    fn fallback_prompt_layout() {
        assert_eq!(
            fallback_prompt("", "hi"),
            "\nUser: hi\nRespond conversationally."
        );
    }

    #[test]
    fn summary_keeps_trailing_turns() {
        let history: Vec<String> = ["User: a", "Bot: b", "User: c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            summarize_history(&history, 2),
            "Recent conversation:\nBot: b\nUser: c"
        );
        assert_eq!(summarize_history(&history, 0), "");
        assert_eq!(summarize_history(&[], 4), "");
    }
}
