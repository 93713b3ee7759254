mod diff;
mod locks;

pub use locks::EditLocks;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fnord_approvals::{decide_edit, AutoPolicy, EditApprovals, EditRequest};
use fnord_core::ToolSpec;
use fnord_ui::UiHandle;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::tool::{optional_str, require_array, require_str, Tool, ToolArgError, ToolOutcome};

fn resolve(project_root: &std::path::Path, relative: &str) -> PathBuf {
    project_root.join(relative)
}

fn backup_path(full: &std::path::Path) -> PathBuf {
    let mut s = full.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

/// Locates contiguous line ranges in a file matching each query string,
/// the first stage of the find-hunks/make-patch/apply-patch pipeline
/// (§4.3 "file editing tools").
pub struct FindHunksTool {
    pub project_root: PathBuf,
}

#[async_trait]
impl Tool for FindHunksTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "find_hunks".to_string(),
            description: "Finds contiguous line ranges in a file matching each of a set of search strings.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "needles": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["file_path", "needles"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "file_path")?;
        require_array(args, "needles")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let file_path = require_str(&args, "file_path").unwrap();
        let needles = require_array(&args, "needles").unwrap();
        let full = resolve(&self.project_root, file_path);
        let content = match std::fs::read_to_string(&full) {
            Ok(c) => c,
            Err(e) => return ToolOutcome::Error(format!("{file_path}: {e}")),
        };
        let lines: Vec<&str> = content.lines().collect();

        let mut hunks = Vec::new();
        for needle in needles {
            let Some(needle) = needle.as_str() else {
                continue;
            };
            let needle_lines: Vec<&str> = needle.lines().collect();
            if needle_lines.is_empty() {
                hunks.push(json!({"needle": needle, "found": false}));
                continue;
            }
            let found = lines.windows(needle_lines.len()).position(|w| w == needle_lines.as_slice());
            match found {
                Some(start) => hunks.push(json!({
                    "needle": needle,
                    "found": true,
                    "start_line": start + 1,
                    "end_line": start + needle_lines.len(),
                })),
                None => hunks.push(json!({"needle": needle, "found": false})),
            }
        }
        ToolOutcome::Ok(json!({"hunks": hunks}))
    }
}

/// Stages a unified diff as a [`fnord_core::PatchTicket`] under a temp
/// directory without touching the working tree; `apply_patch` consumes
/// the ticket after approval.
pub struct MakePatchTool {
    pub staging_dir: PathBuf,
}

#[async_trait]
impl Tool for MakePatchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "make_patch".to_string(),
            description: "Stages a proposed unified diff for later application.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "original": {"type": "string"},
                    "updated": {"type": "string"},
                },
                "required": ["file_path", "original", "updated"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "file_path")?;
        require_str(args, "original")?;
        require_str(args, "updated")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let file_path = require_str(&args, "file_path").unwrap();
        let original = require_str(&args, "original").unwrap();
        let updated = require_str(&args, "updated").unwrap();

        let unified = diff::unified_diff(file_path, original, updated);
        if unified.is_empty() {
            return ToolOutcome::Ok(json!({"patch_id": null, "unified_diff": "", "no_changes": true}));
        }

        if let Err(e) = std::fs::create_dir_all(&self.staging_dir) {
            return ToolOutcome::Error(format!("creating staging dir: {e}"));
        }
        let patch_id = Ulid::new().to_string();
        let temp_file_path = self.staging_dir.join(format!("{patch_id}.patch"));
        if let Err(e) = std::fs::write(&temp_file_path, &unified) {
            return ToolOutcome::Error(format!("staging patch: {e}"));
        }

        ToolOutcome::Ok(json!({
            "patch_id": patch_id,
            "temp_file_path": temp_file_path.to_string_lossy(),
            "unified_diff": unified,
        }))
    }
}

/// Applies a staged patch after approval via the edit workflow (§4.4),
/// writing a `.bak` backup of the original file first.
pub struct ApplyPatchTool {
    pub project_root: PathBuf,
    pub edit_mode: bool,
    pub ui: UiHandle,
    pub auto_policy: AutoPolicy,
    pub approvals: Arc<Mutex<EditApprovals>>,
    pub locks: Arc<EditLocks>,
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "apply_patch".to_string(),
            description: "Applies a staged unified diff to its target file.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "temp_file_path": {"type": "string"},
                },
                "required": ["file_path", "temp_file_path"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "file_path")?;
        require_str(args, "temp_file_path")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let file_path = require_str(&args, "file_path").unwrap();
        let temp_file_path = require_str(&args, "temp_file_path").unwrap();

        let unified_diff = match std::fs::read_to_string(temp_file_path) {
            Ok(c) => c,
            Err(e) => return ToolOutcome::Error(format!("reading staged patch: {e}")),
        };

        let mut approvals = self.approvals.lock().await;
        let decision = decide_edit(
            &EditRequest { file_path: file_path.to_string(), unified_diff: unified_diff.clone() },
            self.edit_mode,
            &mut approvals,
            &self.ui,
            self.auto_policy,
        )
        .await;
        drop(approvals);

        match decision {
            fnord_approvals::EditDecision::Denied { reason } | fnord_approvals::EditDecision::Error { reason } => {
                return ToolOutcome::Error(reason);
            }
            fnord_approvals::EditDecision::Approved => {}
        }

        let full = resolve(&self.project_root, file_path);
        let _guard = self.locks.lock_for(&full).await;

        let original = match std::fs::read_to_string(&full) {
            Ok(c) => c,
            Err(e) => return ToolOutcome::Error(format!("{file_path}: {e}")),
        };
        let patched = match diff::apply_unified_diff(&original, &unified_diff) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::Error(format!("applying patch: {e}")),
        };

        let backup = backup_path(&full);
        if let Err(e) = std::fs::write(&backup, &original) {
            return ToolOutcome::Error(format!("writing backup: {e}"));
        }
        if let Err(e) = std::fs::write(&full, &patched) {
            return ToolOutcome::Error(format!("writing {file_path}: {e}"));
        }

        ToolOutcome::Ok(json!({"file_path": file_path, "backup_path": backup.to_string_lossy()}))
    }
}

/// Restores the `.bak` file written by `apply_patch`, if present.
pub struct RestoreBackupTool {
    pub project_root: PathBuf,
    pub locks: Arc<EditLocks>,
}

#[async_trait]
impl Tool for RestoreBackupTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "restore_backup".to_string(),
            description: "Restores a file from the backup written by the last apply_patch call.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}},
                "required": ["file_path"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "file_path")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let file_path = require_str(&args, "file_path").unwrap();
        let full = resolve(&self.project_root, file_path);
        let backup = backup_path(&full);
        let _guard = self.locks.lock_for(&full).await;

        if !backup.exists() {
            return ToolOutcome::Error(format!("no backup found for {file_path}"));
        }
        match std::fs::rename(&backup, &full) {
            Ok(()) => ToolOutcome::Ok(json!({"file_path": file_path, "restored": true})),
            Err(e) => ToolOutcome::Error(format!("restoring {file_path}: {e}")),
        }
    }
}

/// Convenience tool combining find → diff → approve → apply for a single
/// literal search/replace, for the common one-shot editing case.
pub struct MakeChangesTool {
    pub project_root: PathBuf,
    pub edit_mode: bool,
    pub ui: UiHandle,
    pub auto_policy: AutoPolicy,
    pub approvals: Arc<Mutex<EditApprovals>>,
    pub locks: Arc<EditLocks>,
}

#[async_trait]
impl Tool for MakeChangesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "make_changes".to_string(),
            description: "Replaces one contiguous block of a file's text with another, after approval.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "find": {"type": "string"},
                    "replace": {"type": "string"},
                },
                "required": ["file_path", "find", "replace"],
            }),
        }
    }

    fn read_args(&self, args: &Value) -> Result<Value, ToolArgError> {
        require_str(args, "file_path")?;
        require_str(args, "find")?;
        require_str(args, "replace")?;
        Ok(args.clone())
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let file_path = require_str(&args, "file_path").unwrap();
        let find = require_str(&args, "find").unwrap();
        let replace = optional_str(&args, "replace").unwrap_or("");
        let full = resolve(&self.project_root, file_path);

        let original = match std::fs::read_to_string(&full) {
            Ok(c) => c,
            Err(e) => return ToolOutcome::Error(format!("{file_path}: {e}")),
        };
        if !original.contains(find) {
            return ToolOutcome::Error(format!("{file_path}: search text not found"));
        }
        let updated = original.replacen(find, replace, 1);
        let unified_diff = diff::unified_diff(file_path, &original, &updated);

        let mut approvals = self.approvals.lock().await;
        let decision = decide_edit(
            &EditRequest { file_path: file_path.to_string(), unified_diff: unified_diff.clone() },
            self.edit_mode,
            &mut approvals,
            &self.ui,
            self.auto_policy,
        )
        .await;
        drop(approvals);

        match decision {
            fnord_approvals::EditDecision::Denied { reason } | fnord_approvals::EditDecision::Error { reason } => {
                return ToolOutcome::Error(reason);
            }
            fnord_approvals::EditDecision::Approved => {}
        }

        let _guard = self.locks.lock_for(&full).await;
        let backup = backup_path(&full);
        if let Err(e) = std::fs::write(&backup, &original) {
            return ToolOutcome::Error(format!("writing backup: {e}"));
        }
        if let Err(e) = std::fs::write(&full, &updated) {
            return ToolOutcome::Error(format!("writing {file_path}: {e}"));
        }

        ToolOutcome::Ok(json!({"file_path": file_path, "unified_diff": unified_diff}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_find_hunks_locates_contiguous_match() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "one\ntwo\nthree\n").unwrap();
        let tool = FindHunksTool { project_root: dir.path().to_path_buf() };
        let outcome = tool
            .call(json!({"file_path": "a.rs", "needles": ["two"]}))
            .await;
        match outcome {
            ToolOutcome::Ok(v) => {
                assert_eq!(v["hunks"][0]["found"], true);
                assert_eq!(v["hunks"][0]["start_line"], 2);
            }
            _ => panic!("expected ok"),
        }
    }

    #[tokio::test]
    async fn test_make_patch_stages_diff() {
        let dir = tempdir().unwrap();
        let tool = MakePatchTool { staging_dir: dir.path().to_path_buf() };
        let outcome = tool
            .call(json!({"file_path": "a.rs", "original": "one\n", "updated": "two\n"}))
            .await;
        match outcome {
            ToolOutcome::Ok(v) => {
                assert!(v["patch_id"].is_string());
                assert!(v["unified_diff"].as_str().unwrap().contains("-one"));
            }
            _ => panic!("expected ok"),
        }
    }
}
