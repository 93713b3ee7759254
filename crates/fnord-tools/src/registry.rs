use std::collections::HashMap;

use fnord_core::ToolSpec;
use fnord_ui::UiHandle;
use serde_json::Value;

use crate::tool::{Tool, ToolOutcome};

/// C3: the tool registry assembled from all three families. Built at
/// startup from built-ins plus whatever remote servers and frobs this
/// project configures; lookups never touch disk or the network.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: HashMap::new() }
    }

    /// Registers a tool, skipping it (and logging at `debug`) if its
    /// availability probe fails.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if !tool.is_available() {
            tracing::debug!(name = %tool.spec().name, "tool unavailable, skipping registration");
            return;
        }
        let name = tool.spec().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Dispatches a single call, emitting request/result notes through C5
    /// and a tracing span carrying name and duration, matching the
    /// teacher's `#[tracing::instrument]` convention on tool dispatch.
    pub async fn dispatch(&self, name: &str, args: Value, ui: &UiHandle) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            return ToolOutcome::Error(format!("unknown tool: {name}"));
        };

        let validated = match tool.read_args(&args) {
            Ok(v) => v,
            Err(e) => {
                let message = e.to_string();
                ui.log(format!("{name}: {message}")).await;
                return ToolOutcome::Error(message);
            }
        };

        ui.log(tool.ui_note_on_request(&validated)).await;
        let started = std::time::Instant::now();
        let span = tracing::debug_span!("tool_call", tool = %name);
        let _entered = span.enter();
        let result = tool.call(validated.clone()).await;
        tracing::debug!(tool = %name, elapsed_ms = started.elapsed().as_millis() as u64, "tool call complete");
        ui.log(tool.ui_note_on_result(&validated, &result)).await;
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                description: "echoes its input".to_string(),
                parameters_schema: serde_json::json!({"type": "object"}),
            }
        }

        async fn call(&self, args: Value) -> ToolOutcome {
            ToolOutcome::Ok(args)
        }
    }

    struct UnavailableTool;

    #[async_trait]
    impl Tool for UnavailableTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "unavailable".to_string(),
                description: "never available".to_string(),
                parameters_schema: serde_json::json!({}),
            }
        }

        fn is_available(&self) -> bool {
            false
        }

        async fn call(&self, _args: Value) -> ToolOutcome {
            ToolOutcome::Error("should never run".to_string())
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let (queue, _c) = fnord_ui::UiQueue::start(true);
        let ui = queue.handle();
        let outcome = registry.dispatch("nope", serde_json::json!({}), &ui).await;
        assert!(matches!(outcome, ToolOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_dispatch_echo_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let (queue, _c) = fnord_ui::UiQueue::start(true);
        let ui = queue.handle();
        let outcome = registry.dispatch("echo", serde_json::json!({"a": 1}), &ui).await;
        match outcome {
            ToolOutcome::Ok(v) => assert_eq!(v, serde_json::json!({"a": 1})),
            _ => panic!("expected ok"),
        }
    }

    #[test]
    fn test_unavailable_tool_is_not_registered() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(UnavailableTool));
        assert!(!registry.contains("unavailable"));
    }
}
