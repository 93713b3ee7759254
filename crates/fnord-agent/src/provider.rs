use async_trait::async_trait;
use fnord_core::{Message, ToolCall, ToolSpec};

/// Result of one model turn: either terminal text or a batch of tool calls
/// to dispatch before the next turn.
#[derive(Debug, Clone)]
pub enum CompletionResponse {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Whether a new user prompt continues the active conversation or starts a
/// fresh one (§"Auto-timestamping").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    New,
    Continue,
}

/// Abstract transport to the model(s) backing the completion loop (C6) and
/// the background indexer (C7). A concrete implementation lives in
/// `http_provider`; tests use in-memory stubs.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> anyhow::Result<CompletionResponse>;

    /// Classifies a new prompt against the tail of an existing conversation
    /// using a lightweight auxiliary model, to decide whether to insert a
    /// timestamp marker.
    async fn classify_turn(&self, tail: &[Message], prompt: &str) -> anyhow::Result<TurnKind>;
}
