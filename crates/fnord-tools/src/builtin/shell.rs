use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fnord_approvals::{decide_shell, full_command_string, AutoPolicy, Command as ApprovalCommand, Operator, Pipeline, SessionApprovals, ShellDecision};
use fnord_core::ToolSpec;
use fnord_process::{spawn, SpawnOptions};
use fnord_settings::SettingsStore;
use fnord_ui::UiHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::tool::{require_array, Tool, ToolArgError, ToolOutcome};

#[derive(Debug, Deserialize)]
struct RawCommand {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Shell execution built-in, routed through the approvals engine's
/// decision procedure before any process is spawned (§4.3, §4.4).
pub struct ShellTool {
    pub project_root: PathBuf,
    pub project: String,
    pub settings: Arc<SettingsStore>,
    pub ui: UiHandle,
    pub edit_mode: bool,
    pub session_auto_approve: bool,
    pub auto_policy: AutoPolicy,
    pub session: Arc<Mutex<SessionApprovals>>,
}

#[async_trait]
impl Tool for ShellTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "shell".to_string(),
            description: "Runs a pipeline of shell commands after approval.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "operator": {"type": "string", "enum": ["|", "&&"]},
                    "commands": {"type": "array"},
                    "purpose": {"type": "string"},
                },
                "required": ["commands", "purpose"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_array(args, "commands")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let operator = match args.get("operator").and_then(Value::as_str) {
            Some("&&") => Operator::And,
            _ => Operator::Pipe,
        };
        let purpose = args.get("purpose").and_then(Value::as_str).unwrap_or("").to_string();
        let raw_commands: Vec<RawCommand> = match args.get("commands").cloned() {
            Some(v) => match serde_json::from_value(v) {
                Ok(c) => c,
                Err(e) => return ToolOutcome::Error(format!("malformed commands: {e}")),
            },
            None => return ToolOutcome::Error("missing argument: commands".to_string()),
        };
        let pipeline = Pipeline {
            operator,
            commands: raw_commands
                .into_iter()
                .map(|c| ApprovalCommand { command: c.command, args: c.args })
                .collect(),
            purpose,
        };

        let session = self.session.lock().await.clone();
        let decision = decide_shell(
            &pipeline,
            session,
            &self.settings,
            Some(&self.project),
            self.edit_mode,
            self.session_auto_approve,
            &self.ui,
            self.auto_policy,
        )
        .await;

        let next_state = match decision {
            ShellDecision::Denied { reason, state } => {
                *self.session.lock().await = state;
                return ToolOutcome::Error(format!("denied: {reason}"));
            }
            ShellDecision::Error { reason, state } => {
                *self.session.lock().await = state;
                return ToolOutcome::Error(reason);
            }
            ShellDecision::Approved { state } => state,
        };
        *self.session.lock().await = next_state;

        let mut outputs = Vec::new();
        for command in &pipeline.commands {
            let options = SpawnOptions {
                cwd: Some(&self.project_root),
                timeout: Duration::from_secs(60),
                ..Default::default()
            };
            match spawn(&command.command, &command.args, options).await {
                Ok(result) => outputs.push(json!({
                    "command": full_command_string(command),
                    "exit_code": result.exit_code,
                    "stdout": result.stdout_string(),
                    "stderr": String::from_utf8_lossy(&result.stderr),
                })),
                Err(e) => return ToolOutcome::Error(format!("{}: {e}", full_command_string(command))),
            }
        }
        ToolOutcome::Ok(json!({"results": outputs}))
    }
}
