//! `notes {list,add,remove}`: CLI-side CRUD over the same slug-keyed JSON
//! files the `notes` tool manages at `<project>/notes/<slug>.json`, so a
//! note added from the shell is immediately visible to the model and vice
//! versa.

use anyhow::Result;
use fnord_tools::builtin::JsonCrudTool;
use fnord_tools::{Tool, ToolOutcome};
use serde_json::json;

use crate::context::AppContext;

fn notes_tool(ctx: &AppContext, project: &str) -> Result<JsonCrudTool> {
    Ok(JsonCrudTool {
        name: "notes",
        description: "CRUD over the project's saved notes.",
        dir: ctx.project_dir(project)?.join("notes"),
    })
}

fn report(outcome: ToolOutcome) -> Result<()> {
    match outcome {
        ToolOutcome::Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        ToolOutcome::Error(message) => anyhow::bail!(message),
    }
}

pub async fn handle_list(ctx: &AppContext, project: String) -> Result<()> {
    let tool = notes_tool(ctx, &project)?;
    report(tool.call(json!({"action": "list"})).await)
}

pub async fn handle_add(ctx: &AppContext, project: String, slug: String, content: String) -> Result<()> {
    let tool = notes_tool(ctx, &project)?;
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap_or(serde_json::Value::String(content));
    report(tool.call(json!({"action": "add", "slug": slug, "content": parsed})).await)
}

pub async fn handle_remove(ctx: &AppContext, project: String, slug: String) -> Result<()> {
    let tool = notes_tool(ctx, &project)?;
    report(tool.call(json!({"action": "remove", "slug": slug})).await)
}
