use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_process::{spawn, SpawnOptions};
use serde::Deserialize;
use serde_json::Value;

use crate::tool::{Tool, ToolOutcome};

#[derive(Debug, Clone, Deserialize)]
struct FrobRegistry {
    name: String,
    #[serde(default)]
    global: bool,
    #[serde(default)]
    projects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FrobSpec {
    description: String,
    #[serde(default)]
    parameters_schema: Value,
}

/// An external user integration (§4.3 "frobs"): discovered from a
/// directory containing `registry.json` + `spec.json` + an executable
/// `main`, invoked as a subprocess.
pub struct FrobTool {
    dir: PathBuf,
    name: String,
    description: String,
    parameters_schema: Value,
    config_subset: Value,
}

#[async_trait]
impl Tool for FrobTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters_schema: self.parameters_schema.clone(),
        }
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let mut env = HashMap::new();
        env.insert("PROJECT".to_string(), String::new());
        env.insert(
            "CONFIG".to_string(),
            serde_json::to_string(&self.config_subset).unwrap_or_default(),
        );
        env.insert("ARGS_JSON".to_string(), serde_json::to_string(&args).unwrap_or_default());

        let options = SpawnOptions {
            cwd: Some(&self.dir),
            env,
            timeout: Duration::from_secs(30),
            ..Default::default()
        };
        match spawn(&self.dir.join("main").to_string_lossy(), &[], options).await {
            Ok(result) if result.success() => ToolOutcome::Ok(Value::String(result.stdout_string())),
            Ok(result) => ToolOutcome::Error(String::from_utf8_lossy(&result.stderr).into_owned()),
            Err(e) => ToolOutcome::Error(e.to_string()),
        }
    }
}

/// Scans `frobs_dir` for subdirectories carrying the full filesystem
/// contract, filtering each entry's registration by project (or global).
pub fn discover(frobs_dir: &Path, project: &str, config_subset: &Value) -> Vec<FrobTool> {
    let mut frobs = Vec::new();
    let Ok(entries) = std::fs::read_dir(frobs_dir) else {
        return frobs;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let registry_path = dir.join("registry.json");
        let spec_path = dir.join("spec.json");
        let main_path = dir.join("main");
        if !registry_path.exists() || !spec_path.exists() || !main_path.exists() {
            continue;
        }
        let Ok(registry_raw) = std::fs::read_to_string(&registry_path) else { continue };
        let Ok(registry): Result<FrobRegistry, _> = serde_json::from_str(&registry_raw) else { continue };
        if !registry.global && !registry.projects.iter().any(|p| p == project) {
            continue;
        }
        let Ok(spec_raw) = std::fs::read_to_string(&spec_path) else { continue };
        let Ok(spec): Result<FrobSpec, _> = serde_json::from_str(&spec_raw) else { continue };

        frobs.push(FrobTool {
            dir,
            name: registry.name,
            description: spec.description,
            parameters_schema: spec.parameters_schema,
            config_subset: config_subset.clone(),
        });
    }
    frobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_frob(base: &Path, name: &str, global: bool, projects: &[&str]) {
        let dir = base.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("registry.json"),
            serde_json::json!({"name": name, "global": global, "projects": projects}).to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join("spec.json"),
            serde_json::json!({"description": "a frob", "parameters_schema": {}}).to_string(),
        )
        .unwrap();
        std::fs::write(dir.join("main"), "#!/bin/sh\necho hi\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir.join("main")).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dir.join("main"), perms).unwrap();
        }
    }

    #[test]
    fn test_discover_filters_by_project() {
        let dir = tempdir().unwrap();
        write_frob(dir.path(), "global-frob", true, &[]);
        write_frob(dir.path(), "scoped-frob", false, &["demo"]);
        write_frob(dir.path(), "other-frob", false, &["other"]);

        let mut names: Vec<String> = discover(dir.path(), "demo", &serde_json::json!({}))
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["global-frob".to_string(), "scoped-frob".to_string()]);
    }

    #[test]
    fn test_discover_skips_incomplete_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("incomplete")).unwrap();
        std::fs::write(dir.path().join("incomplete").join("registry.json"), "{}").unwrap();
        let frobs = discover(dir.path(), "demo", &serde_json::json!({}));
        assert!(frobs.is_empty());
    }
}
