//! `index`, `files`, `summary`: inspecting and (re)building a project's
//! index (C2/C7).

use anyhow::{Context, Result};
use fnord_index::{index_entry, next_stale_entry};

use crate::cli::OutputFormat;
use crate::context::AppContext;

pub async fn handle_index(
    ctx: &AppContext,
    project: String,
    dir: String,
    exclude: Vec<String>,
    reindex: bool,
) -> Result<()> {
    // Registers (or updates the root/exclude of) this project, preserving
    // any approvals or mcp_servers it already has on record.
    let mut record = ctx.settings.get_project(&project)?.unwrap_or_default();
    record.root = dir;
    record.exclude = exclude;
    ctx.settings.set_project_data(&project, record)?;

    let index = ctx.open_index(&project)?;
    if reindex {
        let removed = index.delete_missing_files().context("pruning deleted files")?;
        ctx.ui.log(format!("pruned {removed} deleted file(s)")).await;
    }

    let mut indexed = 0usize;
    while let Some(relative_path) = next_stale_entry(&index).context("scanning for stale entries")? {
        ctx.ui.spinner_line(format!("indexing {relative_path}")).await;
        index_entry(&index, ctx.provider.as_ref(), &relative_path).await?;
        indexed += 1;
    }
    ctx.ui.log(format!("indexed {indexed} file(s) for project '{project}'")).await;
    Ok(())
}

pub async fn handle_files(ctx: &AppContext, project: String, format: OutputFormat) -> Result<()> {
    let index = ctx.open_index(&project)?;
    let files = index.list_files().context("listing indexed files")?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
        OutputFormat::Text => {
            for file in &files {
                println!("{file}");
            }
        }
    }
    Ok(())
}

pub async fn handle_summary(ctx: &AppContext, project: String, file: String) -> Result<()> {
    let index = ctx.open_index(&project)?;
    let entry = index.entry(&file);
    let meta = entry
        .read_meta()
        .with_context(|| format!("'{file}' is not indexed in project '{project}'"))?;
    match meta.summary {
        Some(summary) => println!("{summary}"),
        None => ctx.ui.log(format!("'{file}' has no stored summary")).await,
    }
    Ok(())
}
