//! Chat context assembly.
//!
//! Pure functions that build the prompt sent to the chat model from a
//! session's document chunks and its recent message history. No I/O happens
//! here; the HTTP layer fetches the inputs and persists the results.
//!
//! The assembled prompt has up to three blocks, in this order: recent
//! conversation history (`role: content` lines), document context (chunk
//! contents joined by blank lines), and the user's question followed by a
//! fixed instruction to answer only from the provided content.

use crate::models::ChatMessage;

/// Number of trailing messages included as conversation context.
pub const HISTORY_LIMIT: usize = 10;

/// Fixed instruction appended after the user question.
const ANSWER_INSTRUCTION: &str = "Please provide a helpful and accurate response based on the \
document content provided. If the question cannot be answered from the document content, \
politely explain that the information is not available in the provided documents.";

/// The last [`HISTORY_LIMIT`] messages, oldest dropped first.
///
/// The input must already be ordered by timestamp ascending; truncation is
/// from the head so the newest messages always survive.
pub fn recent_history(messages: &[ChatMessage]) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(HISTORY_LIMIT);
    &messages[start..]
}

/// Compose the model prompt from the question, document chunks, and history.
pub fn build_prompt(question: &str, chunk_contents: &[String], history: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    if !history.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for message in history {
            prompt.push_str(message.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if !chunk_contents.is_empty() {
        prompt.push_str("Based on the following document content:\n\n");
        prompt.push_str(&chunk_contents.join("\n\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str("User question: ");
    prompt.push_str(question);
    prompt.push_str("\n\n");
    prompt.push_str(ANSWER_INSTRUCTION);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    fn msg(i: i64, role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: format!("m{i}"),
            session_id: "s1".to_string(),
            role,
            content: content.to_string(),
            timestamp: i,
        }
    }

    #[test]
    fn chunks_appear_verbatim() {
        let chunks = vec!["a.".to_string(), "b.".to_string()];
        let prompt = build_prompt("what is a?", &chunks, &[]);
        assert!(prompt.contains("a.\n\nb."));
        assert!(prompt.contains("Based on the following document content:"));
        assert!(prompt.contains("User question: what is a?"));
    }

    #[test]
    fn history_block_formats_role_lines() {
        let history = vec![
            msg(1, MessageRole::User, "hello"),
            msg(2, MessageRole::Assistant, "hi there"),
        ];
        let prompt = build_prompt("next?", &[], &history);
        assert!(prompt.contains("Previous conversation:\nuser: hello\nassistant: hi there\n"));
    }

    #[test]
    fn empty_blocks_are_omitted() {
        let prompt = build_prompt("solo question", &[], &[]);
        assert!(!prompt.contains("Previous conversation:"));
        assert!(!prompt.contains("Based on the following document content:"));
        assert!(prompt.starts_with("User question: solo question"));
        assert!(prompt.contains("not available in the provided documents"));
    }

    #[test]
    fn history_truncates_to_last_ten() {
        let messages: Vec<ChatMessage> = (0..15)
            .map(|i| msg(i, MessageRole::User, &format!("message {i}")))
            .collect();
        let recent = recent_history(&messages);
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent[0].content, "message 5");
        assert_eq!(recent[9].content, "message 14");

        let prompt = build_prompt("q", &[], recent);
        assert!(!prompt.contains("message 4\n"));
        assert!(prompt.contains("message 5"));
        assert!(prompt.contains("message 14"));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let messages: Vec<ChatMessage> = (0..3)
            .map(|i| msg(i, MessageRole::User, &format!("m{i}")))
            .collect();
        assert_eq!(recent_history(&messages).len(), 3);
    }
}
