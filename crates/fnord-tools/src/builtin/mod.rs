pub mod edit;
pub mod file_info;
pub mod git;
pub mod json_crud;
pub mod ripgrep;
pub mod search;
pub mod shell;
pub mod tasks;

pub use edit::{ApplyPatchTool, EditLocks, FindHunksTool, MakeChangesTool, MakePatchTool, RestoreBackupTool};
pub use file_info::FileInfoTool;
pub use git::{GitSubcommand, GitTool};
pub use json_crud::JsonCrudTool;
pub use ripgrep::RipgrepTool;
pub use search::{Embedder, SemanticSearchTool};
pub use shell::ShellTool;
pub use tasks::TaskListTool;
