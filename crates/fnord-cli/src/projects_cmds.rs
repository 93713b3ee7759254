//! `projects`: lists every project known to settings.

use anyhow::{Context, Result};

use crate::context::AppContext;

pub async fn handle_projects(ctx: &AppContext) -> Result<()> {
    let names = ctx.settings.list_projects().context("listing projects")?;
    if names.is_empty() {
        ctx.ui.log("no projects configured yet").await;
        return Ok(());
    }
    for name in names {
        if let Some(record) = ctx.settings.get_project(&name)? {
            println!("{name}  {}", record.root);
        }
    }
    Ok(())
}
