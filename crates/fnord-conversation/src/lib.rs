pub mod rollup;
pub mod store;
pub mod types;

/// `fork` copies history up to the most recent assistant message into a new
/// conversation; `follow` appends to the named conversation in place.
pub use store as manager;

pub use rollup::{compute_long_term_memory_hash, needs_rollup, rollup_conversation, ConversationRollup};
pub use store::ConversationStore;
pub use types::{Conversation, ConversationMeta};
