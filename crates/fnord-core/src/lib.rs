pub mod error;
pub mod hash;
pub mod types;

pub use error::FnordError;
pub use types::{
    ApprovalRecord, ApprovalScope, IndexEntryMeta, Message, PatchTicket, Project, Role, ToolCall,
    ToolSpec,
};

pub type Result<T> = anyhow::Result<T>;
