use std::collections::HashSet;
use std::time::Duration;

use fnord_core::ApprovalRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::shell::{compute_prefix, full_command_string, hard_rejection_reason, Command, Pipeline};

/// Prefixes the engine treats as approved without ever consulting stored
/// approvals (§4.4 step 1).
const BUILTIN_READ_ONLY: &[&str] = &[
    "git log", "git show", "git diff", "git branch", "git status", "git blame",
    "rg", "cat", "ls", "find",
];

/// Consulted in addition to the read-only list when edit mode and
/// session-auto approval are both active.
const BUILTIN_WRITE_ALLOWED: &[&str] = &["git add", "git commit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPolicy {
    /// No timer; always waits for a human response.
    None,
    /// Auto-approve if the human hasn't responded within the duration.
    ApproveAfter(Duration),
    /// Auto-deny if the human hasn't responded within the duration.
    DenyAfter(Duration),
}

/// Session-scoped approval state, threaded explicitly through calls rather
/// than held as global mutable state (§9 "Global/process-wide state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionApprovals {
    pub shell: Vec<ApprovalRecord>,
}

#[derive(Debug, Clone)]
pub enum ShellDecision {
    Approved { state: SessionApprovals },
    Denied { reason: String, state: SessionApprovals },
    Error { reason: String, state: SessionApprovals },
}

pub struct PendingPersist {
    pub prefix: String,
}

fn approval_matches(record: &ApprovalRecord, full_command: &str) -> bool {
    match record {
        ApprovalRecord::Prefix { pattern } => full_command.starts_with(pattern.as_str()),
        // Intentionally unanchored: SPEC_FULL.md's Open Question decision
        // preserves this from the original behaviour.
        ApprovalRecord::Regex { pattern } => Regex::new(pattern)
            .map(|re| re.is_match(full_command))
            .unwrap_or(false),
    }
}

fn is_approved_by(records: &[ApprovalRecord], prefix: &str, full_command: &str) -> bool {
    records.iter().any(|r| match r {
        ApprovalRecord::Prefix { pattern } => prefix == pattern || full_command.starts_with(pattern.as_str()),
        ApprovalRecord::Regex { .. } => approval_matches(r, full_command),
    })
}

/// Evaluates one command through steps 1-3 of the decision procedure,
/// without prompting. Returns `true` if approved by a non-interactive
/// source.
pub fn command_is_preapproved(
    command: &Command,
    session: &SessionApprovals,
    settings_shell: &[ApprovalRecord],
    edit_mode: bool,
    session_auto_approve: bool,
) -> bool {
    let prefix = compute_prefix(command);
    let full = full_command_string(command);

    let read_only: HashSet<&str> = BUILTIN_READ_ONLY.iter().copied().collect();
    if read_only.contains(prefix.as_str()) {
        return true;
    }
    if edit_mode && session_auto_approve {
        let write_allowed: HashSet<&str> = BUILTIN_WRITE_ALLOWED.iter().copied().collect();
        if write_allowed.contains(prefix.as_str()) {
            return true;
        }
    }
    if is_approved_by(&session.shell, &prefix, &full) {
        return true;
    }
    if is_approved_by(settings_shell, &prefix, &full) {
        return true;
    }
    false
}

/// Commands in `pipeline` that are not yet approved by any non-interactive
/// source, paired with their computed prefix for the "Approve persistently"
/// prompt default.
pub fn pending_commands(
    pipeline: &Pipeline,
    session: &SessionApprovals,
    settings_shell: &[ApprovalRecord],
    edit_mode: bool,
    session_auto_approve: bool,
) -> Vec<PendingPersist> {
    pipeline
        .commands
        .iter()
        .filter(|c| !command_is_preapproved(c, session, settings_shell, edit_mode, session_auto_approve))
        .map(|c| PendingPersist {
            prefix: compute_prefix(c),
        })
        .collect()
}

/// Checks hard rejection across every command in the pipeline. Returns the
/// first violation's reason, if any.
pub fn hard_rejection(pipeline: &Pipeline) -> Option<String> {
    pipeline.commands.iter().find_map(hard_rejection_reason)
}

/// Non-interactive evaluation: used when every command is pre-approved, or
/// to compute whether prompting is even necessary. §8 Property 4 and the
/// empty-pipeline boundary behaviour both reduce to this function returning
/// `Approved` without any prompting.
pub fn evaluate(
    pipeline: &Pipeline,
    session: SessionApprovals,
    settings_shell: &[ApprovalRecord],
    edit_mode: bool,
    session_auto_approve: bool,
) -> ShellDecision {
    if let Some(reason) = hard_rejection(pipeline) {
        return ShellDecision::Denied { reason, state: session };
    }
    if pipeline.commands.is_empty() {
        return ShellDecision::Approved { state: session };
    }
    let pending = pending_commands(pipeline, &session, settings_shell, edit_mode, session_auto_approve);
    if pending.is_empty() {
        ShellDecision::Approved { state: session }
    } else {
        ShellDecision::Error {
            reason: "pending approval required".to_string(),
            state: session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Operator;

    fn pipeline(commands: Vec<Command>) -> Pipeline {
        Pipeline {
            operator: Operator::Pipe,
            commands,
            purpose: "test".to_string(),
        }
    }

    #[test]
    fn test_s1_read_only_command_approved_without_prompting() {
        let p = pipeline(vec![Command {
            command: "/usr/bin/git".to_string(),
            args: vec!["log".to_string(), "-n".to_string(), "1".to_string()],
        }]);
        let decision = evaluate(&p, SessionApprovals::default(), &[], false, false);
        assert!(matches!(decision, ShellDecision::Approved { .. }));
    }

    #[test]
    fn test_s2_shell_invocation_rejected() {
        let p = pipeline(vec![Command {
            command: "bash".to_string(),
            args: vec!["-c".to_string(), "rm -rf /".to_string()],
        }]);
        let decision = evaluate(&p, SessionApprovals::default(), &[], false, false);
        match decision {
            ShellDecision::Denied { reason, .. } => {
                assert_eq!(reason, "shell invocation not allowed: bash -c rm -rf /");
            }
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn test_empty_pipeline_is_approved() {
        let p = pipeline(vec![]);
        let decision = evaluate(&p, SessionApprovals::default(), &[], false, false);
        assert!(matches!(decision, ShellDecision::Approved { .. }));
    }

    #[test]
    fn test_settings_approval_covers_prefix() {
        let p = pipeline(vec![Command {
            command: "docker".to_string(),
            args: vec!["image".to_string(), "ls".to_string()],
        }]);
        let settings_shell = vec![ApprovalRecord::Prefix { pattern: "docker image".to_string() }];
        let decision = evaluate(&p, SessionApprovals::default(), &settings_shell, false, false);
        assert!(matches!(decision, ShellDecision::Approved { .. }));
    }

    #[test]
    fn test_unapproved_command_is_pending() {
        let p = pipeline(vec![Command {
            command: "docker".to_string(),
            args: vec!["image".to_string(), "ls".to_string()],
        }]);
        let decision = evaluate(&p, SessionApprovals::default(), &[], false, false);
        assert!(matches!(decision, ShellDecision::Error { .. }));
    }

    #[test]
    fn test_session_approval_is_idempotent_set_semantics() {
        let mut session = SessionApprovals::default();
        session.shell.push(ApprovalRecord::Prefix { pattern: "docker image".to_string() });
        session.shell.push(ApprovalRecord::Prefix { pattern: "docker image".to_string() });
        let p = pipeline(vec![Command {
            command: "docker".to_string(),
            args: vec!["image".to_string(), "ls".to_string()],
        }]);
        let decision = evaluate(&p, session, &[], false, false);
        assert!(matches!(decision, ShellDecision::Approved { .. }));
    }
}
