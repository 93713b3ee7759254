pub mod edit;
pub mod engine;
pub mod interactive;
pub mod shell;

pub use edit::{decide_edit, EditApprovals, EditDecision, EditRequest};
pub use engine::{
    command_is_preapproved, evaluate, hard_rejection, pending_commands, AutoPolicy,
    PendingPersist, SessionApprovals, ShellDecision,
};
pub use interactive::decide_shell;
pub use shell::{compute_prefix, full_command_string, hard_rejection_reason, Command, Operator, Pipeline};
