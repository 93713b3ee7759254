//! `conversations`: list or prune a project's stored conversations.

use anyhow::{Context, Result};

use crate::context::AppContext;

pub async fn handle_conversations(ctx: &AppContext, project: String, prune: Option<i64>) -> Result<()> {
    let store = ctx.conversation_store(&project)?;

    if let Some(max_age_days) = prune {
        let removed = store.prune(max_age_days).context("pruning conversations")?;
        ctx.ui.log(format!("pruned {removed} conversation(s) older than {max_age_days} day(s)")).await;
        return Ok(());
    }

    let conversations = store.list().context("listing conversations")?;
    if conversations.is_empty() {
        ctx.ui.log(format!("no conversations for project '{project}'")).await;
        return Ok(());
    }
    for meta in conversations {
        println!("{}  updated {}", meta.id, meta.updated_at.to_rfc3339());
    }
    Ok(())
}
