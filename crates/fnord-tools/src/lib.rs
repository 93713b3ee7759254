pub mod builtin;
pub mod frobs;
pub mod registry;
pub mod remote;
pub mod tool;

pub use frobs::{discover as discover_frobs, FrobTool};
pub use registry::ToolRegistry;
pub use remote::{discover_all as discover_remote_tools, RemoteTool};
pub use tool::{Tool, ToolArgError, ToolOutcome};
