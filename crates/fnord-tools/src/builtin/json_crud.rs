use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fnord_core::ToolSpec;
use serde_json::{json, Value};

use crate::tool::{optional_str, require_str, Tool, ToolArgError, ToolOutcome};

/// Shared CRUD shape for the slug-keyed JSON-file families named in
/// §4.3/§6: notes, long-term memories, and research strategies. Each
/// instance owns one directory and exposes `{list, get, add, remove}`
/// through the `action` argument.
pub struct JsonCrudTool {
    pub name: &'static str,
    pub description: &'static str,
    pub dir: PathBuf,
}

impl JsonCrudTool {
    fn slug_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }
}

#[async_trait]
impl Tool for JsonCrudTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["list", "get", "add", "remove"]},
                    "slug": {"type": "string"},
                    "content": {"type": "object"},
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
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            return ToolOutcome::Error(format!("creating {}: {e}", self.dir.display()));
        }

        match action {
            "list" => list_slugs(&self.dir),
            "get" => {
                let Some(slug) = optional_str(&args, "slug") else {
                    return ToolOutcome::Error("missing argument: slug".to_string());
                };
                read_slug(&self.slug_path(slug))
            }
            "add" => {
                let Some(slug) = optional_str(&args, "slug") else {
                    return ToolOutcome::Error("missing argument: slug".to_string());
                };
                let content = args.get("content").cloned().unwrap_or(Value::Null);
                write_slug(&self.slug_path(slug), &content)
            }
            "remove" => {
                let Some(slug) = optional_str(&args, "slug") else {
                    return ToolOutcome::Error("missing argument: slug".to_string());
                };
                remove_slug(&self.slug_path(slug))
            }
            other => ToolOutcome::Error(format!("unknown action: {other}")),
        }
    }
}

fn list_slugs(dir: &Path) -> ToolOutcome {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => return ToolOutcome::Error(format!("listing {}: {e}", dir.display())),
    };
    let mut slugs = Vec::new();
    for entry in entries.flatten() {
        if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                slugs.push(stem.to_string());
            }
        }
    }
    slugs.sort();
    ToolOutcome::Ok(json!({"slugs": slugs}))
}

fn read_slug(path: &Path) -> ToolOutcome {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(value) => ToolOutcome::Ok(value),
            Err(e) => ToolOutcome::Error(format!("malformed {}: {e}", path.display())),
        },
        Err(_) => ToolOutcome::Error(format!("not found: {}", path.display())),
    }
}

fn write_slug(path: &Path, content: &Value) -> ToolOutcome {
    let serialized = match serde_json::to_string_pretty(content) {
        Ok(s) => s,
        Err(e) => return ToolOutcome::Error(format!("serializing: {e}")),
    };
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&tmp, serialized) {
        return ToolOutcome::Error(format!("writing {}: {e}", tmp.display()));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        return ToolOutcome::Error(format!("renaming into place: {e}"));
    }
    ToolOutcome::Ok(json!({"saved": true}))
}

fn remove_slug(path: &Path) -> ToolOutcome {
    match std::fs::remove_file(path) {
        Ok(()) => ToolOutcome::Ok(json!({"removed": true})),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ToolOutcome::Ok(json!({"removed": false})),
        Err(e) => ToolOutcome::Error(format!("removing {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_add_get_list_remove_round_trip() {
        let dir = tempdir().unwrap();
        let tool = JsonCrudTool {
            name: "notes",
            description: "notes",
            dir: dir.path().to_path_buf(),
        };
        let added = tool
            .call(json!({"action": "add", "slug": "todo", "content": {"text": "hi"}}))
            .await;
        assert!(added.is_ok());

        let listed = tool.call(json!({"action": "list"})).await;
        match listed {
            ToolOutcome::Ok(v) => assert_eq!(v["slugs"], json!(["todo"])),
            _ => panic!("expected ok"),
        }

        let fetched = tool.call(json!({"action": "get", "slug": "todo"})).await;
        match fetched {
            ToolOutcome::Ok(v) => assert_eq!(v["text"], "hi"),
            _ => panic!("expected ok"),
        }

        let removed = tool.call(json!({"action": "remove", "slug": "todo"})).await;
        assert!(removed.is_ok());
        assert!(matches!(
            tool.call(json!({"action": "get", "slug": "todo"})).await,
            ToolOutcome::Error(_)
        ));
    }
}
