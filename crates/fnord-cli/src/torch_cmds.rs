//! `torch`: deletes a project's index and conversations, and forgets it
//! from settings.

use anyhow::{Context, Result};

use crate::context::AppContext;

pub async fn handle_torch(ctx: &AppContext, project: String) -> Result<()> {
    if ctx.settings.get_project(&project)?.is_none() {
        anyhow::bail!("unknown project: {project}");
    }

    let index = ctx.open_index(&project)?;
    index.delete().context("deleting project index")?;

    ctx.settings.delete_project(&project).context("removing project from settings")?;
    ctx.ui.log(format!("torched project '{project}'")).await;
    Ok(())
}
