use std::time::Duration;

use fnord_core::{ApprovalRecord, ApprovalScope};
use fnord_settings::SettingsStore;
use fnord_ui::{PromptChoice, UiError, UiHandle};

use crate::engine::{hard_rejection, pending_commands, AutoPolicy, SessionApprovals, ShellDecision};
use crate::shell::Pipeline;

const APPROVE: usize = 0;
const APPROVE_PERSISTENTLY: usize = 1;
const DENY: usize = 2;
const DENY_WITH_FEEDBACK: usize = 3;

/// Full interactive decision procedure for the shell workflow (§4.4),
/// including the non-TTY short-circuit and the "Approve persistently"
/// pattern/scope prompts.
pub async fn decide_shell(
    pipeline: &Pipeline,
    mut session: SessionApprovals,
    settings: &SettingsStore,
    project: Option<&str>,
    edit_mode: bool,
    session_auto_approve: bool,
    ui: &UiHandle,
    auto_policy: AutoPolicy,
) -> ShellDecision {
    if let Some(reason) = hard_rejection(pipeline) {
        return ShellDecision::Denied { reason, state: session };
    }

    let settings_shell = settings
        .approvals_get(project, "shell")
        .unwrap_or_default();

    let pending = pending_commands(pipeline, &session, &settings_shell, edit_mode, session_auto_approve);
    if pending.is_empty() {
        return ShellDecision::Approved { state: session };
    }

    if !ui.is_tty() {
        return ShellDecision::Error {
            reason: "non-interactive: no_tty".to_string(),
            state: session,
        };
    }

    let interaction = ui.begin_interaction().await;
    let stages_text = pipeline
        .commands
        .iter()
        .map(crate::shell::full_command_string)
        .collect::<Vec<_>>()
        .join(" ");
    let prompt = PromptChoice {
        text: format!("approve: {stages_text} ({})", pipeline.purpose),
        choices: vec![
            "Approve".to_string(),
            "Approve persistently".to_string(),
            "Deny".to_string(),
            "Deny with feedback".to_string(),
        ],
    };

    let choice = match auto_policy {
        AutoPolicy::None => ui.prompt(prompt).await,
        AutoPolicy::ApproveAfter(d) => match tokio::time::timeout(d, ui.prompt(prompt)).await {
            Ok(result) => result,
            Err(_) => Ok(APPROVE),
        },
        AutoPolicy::DenyAfter(d) => match tokio::time::timeout(d, ui.prompt(prompt)).await {
            Ok(result) => result,
            Err(_) => Ok(DENY),
        },
    };

    let decision = match choice {
        Err(UiError::NoTty) => ShellDecision::Error {
            reason: "non-interactive: no_tty".to_string(),
            state: session,
        },
        Err(UiError::ShuttingDown) => ShellDecision::Error {
            reason: "ui queue shutting down".to_string(),
            state: session,
        },
        Ok(choice) if choice == DENY => ShellDecision::Denied {
            reason: "denied by user".to_string(),
            state: session,
        },
        Ok(choice) if choice == DENY_WITH_FEEDBACK => ShellDecision::Denied {
            reason: "denied by user with feedback".to_string(),
            state: session,
        },
        Ok(choice) if choice == APPROVE_PERSISTENTLY => {
            for pending_command in &pending {
                let record = prompt_pattern(ui, &pending_command.prefix).await;
                let scope = prompt_scope(ui).await;
                persist(&mut session, settings, project, scope, record);
            }
            ShellDecision::Approved { state: session }
        }
        Ok(choice) if choice == APPROVE => ShellDecision::Approved { state: session },
        _ => ShellDecision::Error {
            reason: "unrecognised response".to_string(),
            state: session,
        },
    };
    interaction.end().await;
    decision
}

/// Prompts for the pattern to persist, defaulting to the computed prefix
/// when the user enters nothing. Input wrapped in `/…/` is a regex,
/// anything else (including the accepted default) is a literal prefix.
async fn prompt_pattern(ui: &UiHandle, default_prefix: &str) -> ApprovalRecord {
    let message = format!("pattern to approve [{default_prefix}]");
    match ui.prompt_text(message).await {
        Ok(input) if input.is_empty() => ApprovalRecord::Prefix {
            pattern: default_prefix.to_string(),
        },
        Ok(input) => ApprovalRecord::from_user_pattern(&input),
        Err(_) => ApprovalRecord::Prefix {
            pattern: default_prefix.to_string(),
        },
    }
}

/// Prompts for the scope to persist the approval at, defaulting to
/// `Project` if the dialog can't be completed.
async fn prompt_scope(ui: &UiHandle) -> ApprovalScope {
    let prompt = PromptChoice {
        text: "scope".to_string(),
        choices: vec!["session".to_string(), "project".to_string(), "global".to_string()],
    };
    match ui.prompt(prompt).await {
        Ok(0) => ApprovalScope::Session,
        Ok(2) => ApprovalScope::Global,
        _ => ApprovalScope::Project,
    }
}

fn persist(
    session: &mut SessionApprovals,
    settings: &SettingsStore,
    project: Option<&str>,
    scope: ApprovalScope,
    record: ApprovalRecord,
) {
    match scope {
        ApprovalScope::Session => session.shell.push(record),
        ApprovalScope::Project => {
            let _ = settings.approve(project, "shell", record);
        }
        ApprovalScope::Global => {
            let _ = settings.approve(None, "shell", record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Command, Operator};
    use tempfile::tempdir;

    fn pipeline(commands: Vec<Command>) -> Pipeline {
        Pipeline {
            operator: Operator::Pipe,
            commands,
            purpose: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_non_tty_short_circuits_pending() {
        let dir = tempdir().unwrap();
        let settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        let (queue, _consumer) = fnord_ui::UiQueue::start(false);
        let ui = queue.handle();
        let p = pipeline(vec![Command {
            command: "docker".to_string(),
            args: vec!["image".to_string(), "ls".to_string()],
        }]);
        // Note: `ui.is_tty()` reflects the real test process's stdout; CI
        // runs non-interactively, so this exercises the no_tty path there.
        let decision = decide_shell(
            &p,
            SessionApprovals::default(),
            &settings,
            Some("demo"),
            false,
            false,
            &ui,
            AutoPolicy::None,
        )
        .await;
        match decision {
            ShellDecision::Error { reason, .. } => assert!(reason.contains("no_tty") || reason.contains("pending")),
            ShellDecision::Approved { .. } => {}
            ShellDecision::Denied { .. } => panic!("should not deny a plain pending command"),
        }
    }

    #[tokio::test]
    async fn test_preapproved_pipeline_skips_prompting_entirely() {
        let dir = tempdir().unwrap();
        let settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        let (queue, _consumer) = fnord_ui::UiQueue::start(false);
        let ui = queue.handle();
        let p = pipeline(vec![Command {
            command: "git".to_string(),
            args: vec!["log".to_string()],
        }]);
        let decision = decide_shell(
            &p,
            SessionApprovals::default(),
            &settings,
            Some("demo"),
            false,
            false,
            &ui,
            AutoPolicy::None,
        )
        .await;
        assert!(matches!(decision, ShellDecision::Approved { .. }));
    }
}
