use chrono::{DateTime, Utc};
use fnord_core::Message;
use serde::{Deserialize, Serialize};

/// Metadata attached to a conversation: `{id, timestamp, long_term_memory_hash}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Fingerprint of the message history as of the last rollup, used to
    /// detect whether new content has accumulated since then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_memory_hash: Option<String>,
}

/// A conversation: ordered messages plus metadata. Created implicitly on
/// first response, continued by id, forked by copying a history prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub meta: ConversationMeta,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Conversation {
            meta: ConversationMeta { id, created_at: now, updated_at: now, long_term_memory_hash: None },
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }
}
