use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_todo::{TaskStatus, TaskStore};
use serde_json::{json, Value};

use crate::tool::{optional_str, require_str, Tool, ToolArgError, ToolOutcome};

/// Flat task-list CRUD (§4.3), backed by `fnord-todo`'s per-project
/// `tasks.json` document.
pub struct TaskListTool {
    pub store: TaskStore,
}

#[async_trait]
impl Tool for TaskListTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "task_list".to_string(),
            description: "Manages a flat list of tasks for the project.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["list", "add", "complete", "reopen", "remove"]},
                    "id": {"type": "string"},
                    "text": {"type": "string"},
                },
                "required": ["action"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "action")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let action = require_str(&args, "action").unwrap();
        match action {
            "list" => match self.store.list() {
                Ok(tasks) => ToolOutcome::Ok(json!({"tasks": tasks})),
                Err(e) => ToolOutcome::Error(e.to_string()),
            },
            "add" => {
                let Some(text) = optional_str(&args, "text") else {
                    return ToolOutcome::Error("missing argument: text".to_string());
                };
                match self.store.add(text) {
                    Ok(task) => ToolOutcome::Ok(json!(task)),
                    Err(e) => ToolOutcome::Error(e.to_string()),
                }
            }
            "complete" | "reopen" => {
                let Some(id) = optional_str(&args, "id") else {
                    return ToolOutcome::Error("missing argument: id".to_string());
                };
                let status = if action == "complete" { TaskStatus::Done } else { TaskStatus::Open };
                match self.store.set_status(id, status) {
                    Ok(Some(task)) => ToolOutcome::Ok(json!(task)),
                    Ok(None) => ToolOutcome::Error(format!("no such task: {id}")),
                    Err(e) => ToolOutcome::Error(e.to_string()),
                }
            }
            "remove" => {
                let Some(id) = optional_str(&args, "id") else {
                    return ToolOutcome::Error("missing argument: id".to_string());
                };
                match self.store.remove(id) {
                    Ok(removed) => ToolOutcome::Ok(json!({"removed": removed})),
                    Err(e) => ToolOutcome::Error(e.to_string()),
                }
            }
            other => ToolOutcome::Error(format!("unknown action: {other}")),
        }
    }
}
