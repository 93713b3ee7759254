//! Shared startup wiring: settings, a project's on-disk store layout, and
//! the fully assembled tool registry for that project.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use fnord_agent::{CompletionLoop, HttpCompletionProvider, ModelConfig};
use fnord_approvals::{AutoPolicy, EditApprovals, SessionApprovals};
use fnord_conversation::ConversationStore;
use fnord_index::ProjectIndex;
use fnord_settings::SettingsStore;
use fnord_todo::TaskStore;
use fnord_tools::builtin::{
    ApplyPatchTool, EditLocks, FileInfoTool, FindHunksTool, GitSubcommand, GitTool, JsonCrudTool,
    MakeChangesTool, MakePatchTool, RestoreBackupTool, RipgrepTool, SemanticSearchTool, ShellTool,
    TaskListTool,
};
use fnord_tools::ToolRegistry;
use fnord_ui::{UiHandle, UiQueue};
use tokio::sync::Mutex;

pub struct AppContext {
    pub settings: Arc<SettingsStore>,
    pub ui: UiHandle,
    pub provider: Arc<HttpCompletionProvider>,
}

impl AppContext {
    pub fn new(quiet: bool) -> Result<(Self, UiQueue)> {
        let settings = Arc::new(SettingsStore::open(SettingsStore::default_path()?)?);
        let (queue, _consumer) = UiQueue::start(quiet);
        let ui = queue.handle();
        let provider = Arc::new(HttpCompletionProvider::new(ModelConfig::from_env()?));
        Ok((AppContext { settings, ui, provider }, queue))
    }

    pub fn fnord_home(&self) -> Result<PathBuf> {
        let path = SettingsStore::default_path()?;
        Ok(path.parent().context("settings path has no parent")?.to_path_buf())
    }

    pub fn project_dir(&self, project: &str) -> Result<PathBuf> {
        Ok(self.fnord_home()?.join(project))
    }

    pub fn open_index(&self, project: &str) -> Result<Arc<ProjectIndex>> {
        let record = self
            .settings
            .get_project(project)?
            .with_context(|| format!("unknown project: {project}"))?;
        let index = ProjectIndex::open(self.project_dir(project)?, &record.root, record.exclude)?;
        Ok(Arc::new(index))
    }

    pub fn conversation_store(&self, project: &str) -> Result<ConversationStore> {
        ConversationStore::open(self.project_dir(project)?)
    }

    pub fn task_store(&self, project: &str) -> Result<TaskStore> {
        TaskStore::open(self.project_dir(project)?)
    }

    /// Builds the full tool registry for a project: built-ins, configured
    /// remote MCP servers, and discovered frobs.
    pub async fn build_tool_registry(&self, project: &str, edit_mode: bool) -> Result<ToolRegistry> {
        let project_root = PathBuf::from(
            self.settings
                .get_project(project)?
                .with_context(|| format!("unknown project: {project}"))?
                .root,
        );
        let index = self.open_index(project)?;
        let project_dir = self.project_dir(project)?;

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SemanticSearchTool::new(index.clone(), self.provider.clone())));
        registry.register(Box::new(FileInfoTool { project_root: project_root.clone() }));
        registry.register(Box::new(RipgrepTool { project_root: project_root.clone() }));
        for subcommand in [
            GitSubcommand::Grep,
            GitSubcommand::Show,
            GitSubcommand::Diff,
            GitSubcommand::Pickaxe,
            GitSubcommand::ListBranches,
            GitSubcommand::UnstagedChanges,
        ] {
            registry.register(Box::new(GitTool { subcommand, project_root: project_root.clone() }));
        }

        let session_approvals = Arc::new(Mutex::new(SessionApprovals::default()));
        registry.register(Box::new(ShellTool {
            project_root: project_root.clone(),
            project: project.to_string(),
            settings: self.settings.clone(),
            ui: self.ui.clone(),
            edit_mode,
            session_auto_approve: false,
            auto_policy: AutoPolicy::None,
            session: session_approvals,
        }));

        let edit_locks = Arc::new(EditLocks::new());
        let edit_approvals = Arc::new(Mutex::new(EditApprovals::default()));
        registry.register(Box::new(FindHunksTool { project_root: project_root.clone() }));
        registry.register(Box::new(MakePatchTool { staging_dir: project_dir.join("patches") }));
        registry.register(Box::new(ApplyPatchTool {
            project_root: project_root.clone(),
            edit_mode,
            ui: self.ui.clone(),
            auto_policy: AutoPolicy::None,
            approvals: edit_approvals.clone(),
            locks: edit_locks.clone(),
        }));
        registry.register(Box::new(RestoreBackupTool { project_root: project_root.clone(), locks: edit_locks.clone() }));
        registry.register(Box::new(MakeChangesTool {
            project_root: project_root.clone(),
            edit_mode,
            ui: self.ui.clone(),
            auto_policy: AutoPolicy::None,
            approvals: edit_approvals,
            locks: edit_locks,
        }));

        registry.register(Box::new(JsonCrudTool {
            name: "notes",
            description: "CRUD over the project's saved notes.",
            dir: project_dir.join("notes"),
        }));
        registry.register(Box::new(JsonCrudTool {
            name: "memory",
            description: "CRUD over the project's long-term memories.",
            dir: project_dir.join("memory"),
        }));
        registry.register(Box::new(JsonCrudTool {
            name: "strategy",
            description: "CRUD over saved research strategies.",
            dir: self.fnord_home()?.join("prompts"),
        }));
        registry.register(Box::new(TaskListTool { store: self.task_store(project)? }));

        let mcp_servers = self.settings.effective_mcp_servers(project)?;
        for remote in fnord_tools::discover_remote_tools(mcp_servers).await {
            registry.register(Box::new(remote));
        }

        let frobs_dir = self.fnord_home()?.join("frobs");
        for frob in fnord_tools::discover_frobs(&frobs_dir, project, &serde_json::Value::Null) {
            registry.register(Box::new(frob));
        }

        Ok(registry)
    }

    pub fn completion_loop(&self, registry: ToolRegistry, conversations: ConversationStore) -> CompletionLoop {
        CompletionLoop {
            provider: self.provider.clone(),
            tools: Arc::new(registry),
            conversations: Arc::new(conversations),
            ui: self.ui.clone(),
        }
    }
}
