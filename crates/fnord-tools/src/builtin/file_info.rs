use std::path::PathBuf;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use serde_json::{json, Value};

use crate::tool::{require_str, Tool, ToolArgError, ToolOutcome};

/// Reports size, modification time, and line count for a file relative to
/// the project root.
pub struct FileInfoTool {
    pub project_root: PathBuf,
}

#[async_trait]
impl Tool for FileInfoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "file_info".to_string(),
            description: "Reports size, mtime, and line count for a project-relative file.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "path")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let path = match require_str(&args, "path") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::Error(e.to_string()),
        };
        let full = self.project_root.join(path);
        let metadata = match std::fs::metadata(&full) {
            Ok(m) => m,
            Err(e) => return ToolOutcome::Error(format!("{path}: {e}")),
        };
        let line_count = std::fs::read_to_string(&full)
            .map(|s| s.lines().count())
            .unwrap_or(0);
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        ToolOutcome::Ok(json!({
            "path": path,
            "size_bytes": metadata.len(),
            "line_count": line_count,
            "modified_unix": modified,
        }))
    }
}
