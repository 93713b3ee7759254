use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fnord_core::{FnordError, Message, Role, ToolCall, ToolSpec};
use fnord_index::IndexerCapability;
use fnord_tools::Embedder;
use serde_json::{json, Value};
use tracing::warn;

use crate::provider::{CompletionProvider, CompletionResponse, TurnKind};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// Model endpoint configuration, read from settings/environment by the CLI
/// and handed to the agent at startup.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub lightweight_model: String,
    pub embedding_model: String,
}

/// Chat-completions-shaped transport, with a dedicated connection pool for
/// background-indexer traffic so it never contends with foreground
/// completion/embedding calls (§4.7 step 1/4).
pub struct HttpCompletionProvider {
    config: ModelConfig,
    foreground: reqwest::Client,
    background: reqwest::Client,
    use_background: AtomicBool,
}

impl ModelConfig {
    /// Reads endpoint configuration from the environment. Model endpoint
    /// settings have no home in the settings document (§1's scope is
    /// project/approvals/mcp), matching the teacher's `ApiClient::new`
    /// taking these as explicit constructor inputs rather than globals.
    pub fn from_env() -> Result<Self> {
        Ok(ModelConfig {
            base_url: std::env::var("FNORD_API_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("FNORD_API_KEY").unwrap_or_default(),
            model: std::env::var("FNORD_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            lightweight_model: std::env::var("FNORD_LIGHTWEIGHT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: std::env::var("FNORD_EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string()),
        })
    }
}

impl HttpCompletionProvider {
    pub fn new(config: ModelConfig) -> Self {
        HttpCompletionProvider {
            config,
            foreground: reqwest::Client::new(),
            background: reqwest::Client::new(),
            use_background: AtomicBool::new(false),
        }
    }

    fn client(&self) -> &reqwest::Client {
        if self.use_background.load(Ordering::Relaxed) {
            &self.background
        } else {
            &self.foreground
        }
    }

    async fn post_with_retry(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .client()
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.context("reading model response body")?;
                    if status.is_success() {
                        return serde_json::from_str(&text).context("parsing model response JSON");
                    }
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if retryable && attempt < MAX_ATTEMPTS {
                        warn!(attempt, %status, "model request failed, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                    return Err(FnordError::transport(retryable, format!("model request failed: {status}: {text}")).into());
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "model request errored, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => {
                    return Err(FnordError::transport(true, format!("model request errored: {e}")).into());
                }
            }
        }
        unreachable!("loop returns or errors on its final attempt")
    }

    async fn chat(&self, model: &str, messages: &[Message], tools: &[ToolSpec]) -> Result<Value> {
        let mut body = json!({
            "model": model,
            "messages": messages.iter().map(message_to_json).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_spec_to_json).collect::<Vec<_>>());
        }
        self.post_with_retry("chat/completions", body).await
    }
}

fn message_to_json(message: &Message) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut entry = json!({ "role": role, "content": message.content });
    if let Some(tool_calls) = &message.tool_calls {
        entry["tool_calls"] = json!(tool_calls
            .iter()
            .map(|call| json!({
                "id": call.id,
                "type": "function",
                "function": { "name": call.name, "arguments": call.arguments.to_string() },
            }))
            .collect::<Vec<_>>());
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        entry["tool_call_id"] = json!(tool_call_id);
    }
    if let Some(name) = &message.name {
        entry["name"] = json!(name);
    }
    entry
}

fn tool_spec_to_json(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters_schema,
        },
    })
}

fn parse_completion(body: &Value) -> Result<CompletionResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| anyhow!("missing choices[0] in completion response"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| anyhow!("missing choices[0].message in completion response"))?;

    if let Some(raw_calls) = message.get("tool_calls").and_then(Value::as_array) {
        if !raw_calls.is_empty() {
            let mut calls = Vec::with_capacity(raw_calls.len());
            for raw in raw_calls {
                let id = raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let function = raw
                    .get("function")
                    .ok_or_else(|| anyhow!("tool call missing function"))?;
                let name = function
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("tool call missing function.name"))?
                    .to_string();
                let raw_args = function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                let arguments: Value = serde_json::from_str(raw_args).unwrap_or(Value::Object(Default::default()));
                calls.push(ToolCall { id, name, arguments });
            }
            return Ok(CompletionResponse::ToolCalls(calls));
        }
    }

    let content = message.get("content").and_then(Value::as_str).unwrap_or("").to_string();
    Ok(CompletionResponse::Text(content))
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<CompletionResponse> {
        let body = self.chat(&self.config.model, messages, tools).await?;
        parse_completion(&body)
    }

    async fn classify_turn(&self, tail: &[Message], prompt: &str) -> Result<TurnKind> {
        let mut context = tail.to_vec();
        context.push(Message::user(format!(
            "Given the conversation so far, does the following new message continue the \
             current topic, or start a new one? Reply with exactly one word, \"new\" or \
             \"continue\".\n\nNew message: {prompt}"
        )));
        let body = self.chat(&self.config.lightweight_model, &context, &[]).await?;
        match parse_completion(&body)? {
            CompletionResponse::Text(text) if text.to_ascii_lowercase().contains("new") => Ok(TurnKind::New),
            _ => Ok(TurnKind::Continue),
        }
    }
}

#[async_trait]
impl IndexerCapability for HttpCompletionProvider {
    async fn summarize(&self, relative_path: &str, content: &str) -> Result<String> {
        let messages = vec![
            Message::system("Summarize the following source file in 2-3 sentences."),
            Message::user(format!("# {relative_path}\n\n{content}")),
        ];
        match self.complete(&messages, &[]).await? {
            CompletionResponse::Text(text) => Ok(text),
            CompletionResponse::ToolCalls(_) => Err(anyhow!("model returned tool calls for a summarize request")),
        }
    }

    async fn outline(&self, relative_path: &str, content: &str) -> Result<String> {
        let messages = vec![
            Message::system("List the top-level declarations in this file as a bulleted outline."),
            Message::user(format!("# {relative_path}\n\n{content}")),
        ];
        match self.complete(&messages, &[]).await? {
            CompletionResponse::Text(text) => Ok(text),
            CompletionResponse::ToolCalls(_) => Err(anyhow!("model returned tool calls for an outline request")),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = self
            .post_with_retry(
                "embeddings",
                json!({ "model": self.config.embedding_model, "input": text }),
            )
            .await?;
        let vector = body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("missing data[0].embedding in embedding response"))?;
        vector
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| anyhow!("non-numeric embedding component")))
            .collect()
    }

    fn use_background_pool(&self) {
        self.use_background.store(true, Ordering::Relaxed);
    }

    fn clear_background_pool(&self) {
        self.use_background.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl Embedder for HttpCompletionProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        IndexerCapability::embed(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_prefers_tool_calls_over_empty_text() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "function": { "name": "search", "arguments": "{\"query\":\"foo\"}" },
                    }],
                },
            }],
        });
        match parse_completion(&body).unwrap() {
            CompletionResponse::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "search");
                assert_eq!(calls[0].arguments["query"], "foo");
            }
            _ => panic!("expected tool calls"),
        }
    }

    #[test]
    fn test_parse_completion_falls_back_to_text() {
        let body = json!({ "choices": [{ "message": { "content": "hello there" } }] });
        match parse_completion(&body).unwrap() {
            CompletionResponse::Text(text) => assert_eq!(text, "hello there"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_message_to_json_round_trips_tool_call_id() {
        let message = Message::tool_result("call-1", "42");
        let json = message_to_json(&message);
        assert_eq!(json["tool_call_id"], "call-1");
        assert_eq!(json["role"], "tool");
    }
}
