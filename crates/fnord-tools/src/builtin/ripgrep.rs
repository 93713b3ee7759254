use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_process::{spawn, SpawnOptions};
use serde_json::{json, Value};

use crate::tool::{optional_str, require_str, Tool, ToolArgError, ToolOutcome};

pub struct RipgrepTool {
    pub project_root: PathBuf,
}

#[async_trait]
impl Tool for RipgrepTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "ripgrep".to_string(),
            description: "Searches project files with `rg`, gitignore-aware by default.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                },
                "required": ["pattern"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "pattern")?;
        Ok(args.clone())
    }

    fn is_available(&self) -> bool {
        which_rg().is_some()
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let pattern = match require_str(&args, "pattern") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::Error(e.to_string()),
        };
        let path = optional_str(&args, "path").unwrap_or(".");
        let rg_args = vec!["-n".to_string(), pattern.to_string(), path.to_string()];
        let options = SpawnOptions {
            cwd: Some(&self.project_root),
            timeout: Duration::from_secs(20),
            ..Default::default()
        };
        match spawn("rg", &rg_args, options).await {
            Ok(result) if result.exit_code == Some(0) || result.exit_code == Some(1) => {
                ToolOutcome::Ok(json!({"matches": result.stdout_string()}))
            }
            Ok(result) => ToolOutcome::Error(String::from_utf8_lossy(&result.stderr).into_owned()),
            Err(e) => ToolOutcome::Error(e.to_string()),
        }
    }
}

fn which_rg() -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let candidate = dir.join("rg");
            candidate.is_file().then_some(candidate)
        })
    })
}
