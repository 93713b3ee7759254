use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_process::{spawn, SpawnOptions};
use serde_json::{json, Value};

use crate::tool::{optional_str, require_str, Tool, ToolArgError, ToolOutcome};

#[derive(Debug, Clone, Copy)]
pub enum GitSubcommand {
    Grep,
    Show,
    Diff,
    Pickaxe,
    ListBranches,
    UnstagedChanges,
}

impl GitSubcommand {
    fn name(self) -> &'static str {
        match self {
            GitSubcommand::Grep => "git_grep",
            GitSubcommand::Show => "git_show",
            GitSubcommand::Diff => "git_diff",
            GitSubcommand::Pickaxe => "git_pickaxe",
            GitSubcommand::ListBranches => "git_list_branches",
            GitSubcommand::UnstagedChanges => "git_unstaged_changes",
        }
    }

    fn description(self) -> &'static str {
        match self {
            GitSubcommand::Grep => "Searches tracked file contents with `git grep`.",
            GitSubcommand::Show => "Shows an object (commit, path at revision) with `git show`.",
            GitSubcommand::Diff => "Shows a diff between two revisions with `git diff`.",
            GitSubcommand::Pickaxe => "Finds commits adding/removing a string with `git log -S`.",
            GitSubcommand::ListBranches => "Lists local branches with `git branch`.",
            GitSubcommand::UnstagedChanges => "Shows unstaged working-tree changes with `git diff`.",
        }
    }

    fn build_args(self, args: &Value) -> Result<Vec<String>, ToolArgError> {
        match self {
            GitSubcommand::Grep => {
                let pattern = require_str(args, "pattern")?;
                Ok(vec!["grep".to_string(), "-n".to_string(), pattern.to_string()])
            }
            GitSubcommand::Show => {
                let rev = require_str(args, "revision")?;
                Ok(vec!["show".to_string(), rev.to_string()])
            }
            GitSubcommand::Diff => {
                let mut built = vec!["diff".to_string()];
                if let Some(from) = optional_str(args, "from") {
                    let to = optional_str(args, "to").unwrap_or("HEAD");
                    built.push(format!("{from}..{to}"));
                }
                Ok(built)
            }
            GitSubcommand::Pickaxe => {
                let needle = require_str(args, "needle")?;
                Ok(vec!["log".to_string(), "-S".to_string(), needle.to_string(), "--oneline".to_string()])
            }
            GitSubcommand::ListBranches => Ok(vec!["branch".to_string(), "--list".to_string()]),
            GitSubcommand::UnstagedChanges => Ok(vec!["diff".to_string(), "--stat".to_string()]),
        }
    }
}

/// A single tool per git subcommand (§4.3's "git operations" family),
/// sharing a spawn-and-capture implementation over `fnord-process`.
pub struct GitTool {
    pub subcommand: GitSubcommand,
    pub project_root: PathBuf,
}

#[async_trait]
impl Tool for GitTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.subcommand.name().to_string(),
            description: self.subcommand.description().to_string(),
            parameters_schema: json!({"type": "object"}),
        }
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let git_args = match self.subcommand.build_args(&args) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::Error(e.to_string()),
        };
        let options = SpawnOptions {
            cwd: Some(&self.project_root),
            timeout: Duration::from_secs(30),
            ..Default::default()
        };
        match spawn("git", &git_args, options).await {
            Ok(result) if result.success() => ToolOutcome::Ok(json!({"output": result.stdout_string()})),
            Ok(result) => ToolOutcome::Error(String::from_utf8_lossy(&result.stderr).into_owned()),
            Err(e) => ToolOutcome::Error(e.to_string()),
        }
    }
}
