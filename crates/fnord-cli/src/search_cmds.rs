//! `search`: one-shot semantic search over an indexed project, without
//! going through the completion loop.

use anyhow::{Context, Result};
use fnord_index::search;
use fnord_tools::builtin::Embedder;

use crate::cli::OutputFormat;
use crate::context::AppContext;

pub async fn handle_search(
    ctx: &AppContext,
    project: String,
    query: String,
    detail: bool,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let index = ctx.open_index(&project)?;
    let vector = Embedder::embed(ctx.provider.as_ref(), &query)
        .await
        .context("embedding query")?;
    let results = search(&index, &vector, limit, detail).context("searching index")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for result in &results {
                println!("{:>6.3}  {}", result.score, result.relative_path);
                if detail {
                    if let Some(summary) = &result.summary {
                        println!("        {summary}");
                    }
                }
            }
        }
    }
    Ok(())
}
