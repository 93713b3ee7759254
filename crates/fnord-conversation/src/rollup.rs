//! Monthly conversation rollups: bounded summaries used to cap how much
//! history retrieval and context injection have to carry for an old
//! conversation.

use fnord_core::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Conversation;

/// A bounded summary of one conversation's activity for a given month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRollup {
    pub conversation_id: String,
    pub month: String,
    pub message_count: usize,
    pub summary: String,
}

/// Fingerprints a conversation's current message history. Compared against
/// `ConversationMeta::long_term_memory_hash` to decide whether a rollup is
/// stale.
pub fn compute_long_term_memory_hash(messages: &[Message]) -> String {
    let mut hasher = Sha256::new();
    for message in messages {
        hasher.update(message.content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// True if the conversation's messages have changed since its last rollup
/// (or it has never been rolled up).
pub fn needs_rollup(conversation: &Conversation) -> bool {
    let current = compute_long_term_memory_hash(&conversation.messages);
    conversation.meta.long_term_memory_hash.as_deref() != Some(current.as_str())
}

/// Builds a rollup for `conversation`, truncating the assembled summary to
/// roughly `char_budget` characters.
pub fn rollup_conversation(conversation: &Conversation, char_budget: usize) -> ConversationRollup {
    let month = conversation.meta.updated_at.format("%Y-%m").to_string();
    let body: String = conversation
        .messages
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let summary = truncate_to_char_budget(&body, char_budget);
    ConversationRollup {
        conversation_id: conversation.id().to_string(),
        month,
        message_count: conversation.messages.len(),
        summary,
    }
}

fn truncate_to_char_budget(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}\n…[truncated]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Conversation;

    #[test]
    fn test_needs_rollup_detects_new_messages() {
        let mut conversation = Conversation::new("c1".to_string());
        assert!(needs_rollup(&conversation));

        conversation.messages.push(Message::user("hello"));
        let hash = compute_long_term_memory_hash(&conversation.messages);
        conversation.meta.long_term_memory_hash = Some(hash);
        assert!(!needs_rollup(&conversation));

        conversation.messages.push(Message::assistant("hi"));
        assert!(needs_rollup(&conversation));
    }

    #[test]
    fn test_rollup_truncates_long_conversations() {
        let mut conversation = Conversation::new("c2".to_string());
        for i in 0..500 {
            conversation.messages.push(Message::user(format!("message number {i}")));
        }
        let rollup = rollup_conversation(&conversation, 200);
        assert!(rollup.summary.ends_with("…[truncated]"));
        assert_eq!(rollup.message_count, 500);
    }
}
