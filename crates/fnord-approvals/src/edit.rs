use fnord_ui::{PromptChoice, UiError, UiHandle};

use crate::engine::AutoPolicy;

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub file_path: String,
    pub unified_diff: String,
}

#[derive(Debug, Clone, Default)]
pub struct EditApprovals {
    /// Approved for the remainder of the session, bypassing future prompts.
    pub session_auto_approve: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDecision {
    Approved,
    Denied { reason: String },
    Error { reason: String },
}

const APPROVE: usize = 0;
const APPROVE_FOR_SESSION: usize = 1;
const DENY: usize = 2;
const DENY_WITH_FEEDBACK: usize = 3;

/// Edit workflow (§4.4): disabled -> denied; auto-approve -> approved but
/// the diff is still rendered for audit; otherwise prompt.
pub async fn decide_edit(
    request: &EditRequest,
    edit_mode_enabled: bool,
    state: &mut EditApprovals,
    ui: &UiHandle,
    auto_policy: AutoPolicy,
) -> EditDecision {
    if !edit_mode_enabled {
        return EditDecision::Denied {
            reason: "edit mode disabled".to_string(),
        };
    }

    let interaction = ui.begin_interaction().await;
    ui.log(format!("--- diff: {} ---\n{}", request.file_path, request.unified_diff))
        .await;

    if state.session_auto_approve {
        interaction.end().await;
        return EditDecision::Approved;
    }

    let prompt = PromptChoice {
        text: format!("apply edit to {}?", request.file_path),
        choices: vec![
            "Approve".to_string(),
            "Approve for session".to_string(),
            "Deny".to_string(),
            "Deny with feedback".to_string(),
        ],
    };

    let choice = match auto_policy {
        AutoPolicy::None => ui.prompt(prompt).await,
        AutoPolicy::ApproveAfter(d) => tokio::time::timeout(d, ui.prompt(prompt))
            .await
            .unwrap_or(Ok(APPROVE)),
        AutoPolicy::DenyAfter(d) => tokio::time::timeout(d, ui.prompt(prompt))
            .await
            .unwrap_or(Ok(DENY)),
    };
    interaction.end().await;

    match choice {
        Err(UiError::NoTty) => EditDecision::Error {
            reason: "non-interactive: no_tty".to_string(),
        },
        Err(UiError::ShuttingDown) => EditDecision::Error {
            reason: "ui queue shutting down".to_string(),
        },
        Ok(c) if c == APPROVE => EditDecision::Approved,
        Ok(c) if c == APPROVE_FOR_SESSION => {
            state.session_auto_approve = true;
            EditDecision::Approved
        }
        Ok(c) if c == DENY => EditDecision::Denied {
            reason: "denied by user".to_string(),
        },
        Ok(c) if c == DENY_WITH_FEEDBACK => EditDecision::Denied {
            reason: "denied by user with feedback".to_string(),
        },
        _ => EditDecision::Error {
            reason: "unrecognised response".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edit_mode_disabled_is_denied_without_prompting() {
        let (queue, _consumer) = fnord_ui::UiQueue::start(true);
        let ui = queue.handle();
        let mut state = EditApprovals::default();
        let decision = decide_edit(
            &EditRequest {
                file_path: "src/lib.rs".to_string(),
                unified_diff: "@@ -1 +1 @@".to_string(),
            },
            false,
            &mut state,
            &ui,
            AutoPolicy::None,
        )
        .await;
        assert_eq!(
            decision,
            EditDecision::Denied { reason: "edit mode disabled".to_string() }
        );
    }

    #[tokio::test]
    async fn test_session_auto_approve_skips_prompt() {
        let (queue, _consumer) = fnord_ui::UiQueue::start(true);
        let ui = queue.handle();
        let mut state = EditApprovals { session_auto_approve: true };
        let decision = decide_edit(
            &EditRequest {
                file_path: "src/lib.rs".to_string(),
                unified_diff: "@@ -1 +1 @@".to_string(),
            },
            true,
            &mut state,
            &ui,
            AutoPolicy::None,
        )
        .await;
        assert_eq!(decision, EditDecision::Approved);
    }
}
