//! C6: the completion loop. Drains interjections, calls the model, and
//! dispatches any tool calls it returns, repeating until the model produces
//! terminal text or a round bound is hit.

use std::sync::Arc;

use anyhow::{Context, Result};
use fnord_core::{Message, ToolCall};
use fnord_conversation::{Conversation, ConversationStore};
use fnord_tools::ToolRegistry;
use fnord_ui::UiHandle;
use serde_json::Value;
use tracing::warn;

use crate::provider::{CompletionProvider, CompletionResponse, TurnKind};

/// Hard bound on model round-trips within a single turn, guarding against a
/// model that never stops calling tools.
const MAX_ROUNDS: usize = 25;

/// Tool results larger than this many characters are truncated before being
/// appended to history.
const MAX_TOOL_RESULT_CHARS: usize = 16_000;

pub struct CompletionLoop {
    pub provider: Arc<dyn CompletionProvider>,
    pub tools: Arc<ToolRegistry>,
    pub conversations: Arc<ConversationStore>,
    pub ui: UiHandle,
}

pub struct TurnOutcome {
    pub conversation: Conversation,
    pub truncated: bool,
}

impl CompletionLoop {
    /// Runs one user turn to completion: loads or creates the conversation,
    /// classifies + timestamps it, drains interjections each round, and
    /// dispatches tool calls until the model replies with terminal text.
    pub async fn run_turn(
        &self,
        conversation_id: Option<&str>,
        prompt: &str,
        drain_interjections: impl FnMut() -> Vec<String>,
    ) -> Result<TurnOutcome> {
        self.run_turn_bounded(conversation_id, prompt, MAX_ROUNDS, drain_interjections).await
    }

    /// Same as [`run_turn`](Self::run_turn) with an explicit round bound,
    /// for callers (e.g. `--rounds`) that want to override the default.
    pub async fn run_turn_bounded(
        &self,
        conversation_id: Option<&str>,
        prompt: &str,
        max_rounds: usize,
        mut drain_interjections: impl FnMut() -> Vec<String>,
    ) -> Result<TurnOutcome> {
        let mut conversation = match conversation_id {
            Some(id) => self.conversations.load(id).context("loading conversation")?,
            None => self.conversations.create().context("creating conversation")?,
        };

        if conversation_id.is_some() && !conversation.messages.is_empty() {
            let turn_kind = self.provider.classify_turn(&conversation.messages, prompt).await?;
            if turn_kind == TurnKind::New {
                conversation
                    .messages
                    .push(Message::system(format!("--- {} ---", chrono::Utc::now().to_rfc3339())));
            }
        }

        conversation.messages.push(Message::user(prompt));

        let mut truncated = false;
        let tool_specs = self.tools.specs();

        for round in 0..max_rounds {
            for interjection in drain_interjections() {
                conversation
                    .messages
                    .push(Message::user(format!("[User Interjection] {interjection}")));
            }

            let response = self.provider.complete(&conversation.messages, &tool_specs).await?;

            match response {
                CompletionResponse::Text(text) if !text.trim().is_empty() => {
                    conversation.messages.push(Message::assistant(text));
                    break;
                }
                CompletionResponse::Text(_) => {
                    // Empty text with no tool calls: treat as terminal rather
                    // than looping forever on a no-op response.
                    conversation.messages.push(Message::assistant(String::new()));
                    break;
                }
                CompletionResponse::ToolCalls(calls) => {
                    conversation.messages.push(Message::assistant_tool_calls(calls.clone()));
                    let results = self.dispatch_round(calls).await;
                    conversation.messages.extend(results);
                    if round + 1 == max_rounds {
                        truncated = true;
                        warn!(conversation_id = conversation.id(), "completion loop hit round bound");
                        conversation
                            .messages
                            .push(Message::system("round limit reached; stopping before a final model reply"));
                    }
                }
            }
        }

        self.conversations.save(&conversation).context("saving conversation")?;
        Ok(TurnOutcome { conversation, truncated })
    }

    /// Dispatches one round's tool calls, preserving the model's call order
    /// in the returned messages regardless of completion order: sync tools
    /// run sequentially in order, async tools run concurrently and are
    /// re-joined into their original slots.
    async fn dispatch_round(&self, calls: Vec<ToolCall>) -> Vec<Message> {
        let mut slots: Vec<Option<Message>> = vec![None; calls.len()];
        let mut async_handles = Vec::new();

        for (index, call) in calls.iter().enumerate() {
            let is_async = self.tools.get(&call.name).map(|t| t.is_async()).unwrap_or(false);
            if is_async {
                let tools = self.tools.clone();
                let ui = self.ui.clone();
                let name = call.name.clone();
                let args = call.arguments.clone();
                async_handles.push((
                    index,
                    tokio::spawn(async move { tools.dispatch(&name, args, &ui).await }),
                ));
            } else {
                let outcome = self.tools.dispatch(&call.name, call.arguments.clone(), &self.ui).await;
                slots[index] = Some(tool_result_message(&call.id, outcome_to_text(outcome)));
            }
        }

        for (index, handle) in async_handles {
            let text = match handle.await {
                Ok(outcome) => outcome_to_text(outcome),
                Err(e) => format!("tool task panicked: {e}"),
            };
            slots[index] = Some(tool_result_message(&calls[index].id, text));
        }

        slots.into_iter().map(|slot| slot.expect("every call index is filled")).collect()
    }
}

fn tool_result_message(tool_call_id: &str, text: String) -> Message {
    Message::tool_result(tool_call_id, sanitize_tool_result(&text))
}

fn outcome_to_text(outcome: fnord_tools::ToolOutcome) -> String {
    match outcome {
        fnord_tools::ToolOutcome::Ok(value) => value.to_string(),
        fnord_tools::ToolOutcome::Error(reason) => json_error(reason),
    }
}

fn json_error(reason: String) -> String {
    Value::String(reason).to_string()
}

/// Strips control characters tool output may carry from raw subprocess or
/// network bytes, then caps length so one tool call can't blow out the
/// conversation history.
fn sanitize_tool_result(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect();
    if cleaned.chars().count() <= MAX_TOOL_RESULT_CHARS {
        cleaned
    } else {
        let truncated: String = cleaned.chars().take(MAX_TOOL_RESULT_CHARS).collect();
        format!("{truncated}\n…[truncated]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_chars_and_keeps_newlines() {
        let dirty = "line one\n\u{0007}line two\ttabbed";
        let clean = sanitize_tool_result(dirty);
        assert_eq!(clean, "line one\nline two\ttabbed");
    }

    #[test]
    fn test_sanitize_truncates_oversized_output() {
        let huge = "x".repeat(MAX_TOOL_RESULT_CHARS + 100);
        let clean = sanitize_tool_result(&huge);
        assert!(clean.ends_with("…[truncated]"));
        assert!(clean.len() < huge.len());
    }

    #[test]
    fn test_interjection_is_tagged_as_user_interjection() {
        let drained = vec!["a".to_string()];
        let tagged: Vec<Message> = drained
            .into_iter()
            .map(|text| Message::user(format!("[User Interjection] {text}")))
            .collect();
        assert_eq!(tagged[0].content, "[User Interjection] a");
    }
}
