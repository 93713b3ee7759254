//! `ask`: runs the completion loop (C6) to terminal text for one prompt,
//! with optional conversation follow/fork.

use anyhow::{bail, Context, Result};
use fnord_settings::ProjectRecord;

use crate::context::AppContext;

#[allow(clippy::too_many_arguments)]
pub async fn handle_ask(
    ctx: &AppContext,
    project: String,
    question: String,
    rounds: usize,
    follow: Option<String>,
    fork: Option<String>,
    edit: bool,
    directory: Option<String>,
) -> Result<()> {
    // A project is created implicitly by `ask --directory` the same way it
    // is by `index`, per the on-disk "created on first index or ask with an
    // explicit directory" lifecycle.
    if let Some(root) = directory {
        if ctx.settings.get_project(&project)?.is_none() {
            ctx.settings
                .set_project_data(&project, ProjectRecord { root, ..Default::default() })?;
        }
    }

    let registry = ctx.build_tool_registry(&project, edit).await.context("assembling tool registry")?;
    let conversations = ctx.conversation_store(&project)?;

    let conversation_id = match fork {
        Some(source_id) => {
            let forked = conversations.fork(&source_id).context("forking conversation")?;
            Some(forked.id().to_string())
        }
        None => follow,
    };

    let completion = ctx.completion_loop(registry, conversations);
    let outcome = completion
        .run_turn_bounded(conversation_id.as_deref(), &question, rounds, || Vec::new())
        .await
        .context("running completion loop")?;

    if let Some(reply) = outcome.conversation.messages.last() {
        println!("{}", reply.content);
    } else {
        bail!("completion loop produced no reply");
    }
    if outcome.truncated {
        ctx.ui.error("warning: hit the round limit before a final reply").await;
    }
    println!("conversation: {}", outcome.conversation.id());
    Ok(())
}
