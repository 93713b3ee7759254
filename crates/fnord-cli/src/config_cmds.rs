//! `config {list,set,approvals,approve,mcp}`: reading and writing the
//! settings document (C1).

use anyhow::{Context, Result};
use fnord_core::ApprovalRecord;
use fnord_settings::{McpServerConfig, TransportKind};

use crate::cli::{ApprovalScope, McpCommands, McpTransportArg};
use crate::context::AppContext;

pub async fn handle_list(ctx: &AppContext) -> Result<()> {
    let doc = ctx.settings.read().context("reading settings")?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub async fn handle_set(ctx: &AppContext, key: String, value: String) -> Result<()> {
    let parsed: serde_json::Value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
    ctx.settings.set(&key, parsed).context("writing setting")?;
    Ok(())
}

pub async fn handle_approvals(ctx: &AppContext, project: Option<String>) -> Result<()> {
    for kind in ["shell_prefix", "shell_regex", "edit"] {
        let records = ctx.settings.approvals_get(project.as_deref(), kind)?;
        if records.is_empty() {
            continue;
        }
        println!("{kind}:");
        for record in records {
            match record {
                ApprovalRecord::Prefix { pattern } => println!("  prefix: {pattern}"),
                ApprovalRecord::Regex { pattern } => println!("  regex:  /{pattern}/"),
            }
        }
    }
    Ok(())
}

pub async fn handle_approve(ctx: &AppContext, pattern: String, scope: ApprovalScope) -> Result<()> {
    let record = ApprovalRecord::from_user_pattern(&pattern);
    let project = match scope {
        ApprovalScope::Global => None,
        // Session-scoped approvals live only in the running process's
        // in-memory `SessionApprovals`; there is nothing to persist here.
        ApprovalScope::Session => {
            println!("session-scoped approvals are not persisted; nothing to do");
            return Ok(());
        }
        ApprovalScope::Project => {
            anyhow::bail!("`config approve --scope project` requires a current project; use `config mcp`-style per-project commands instead")
        }
    };
    ctx.settings.approve(project, "shell_prefix", record)?;
    Ok(())
}

pub async fn handle_mcp(ctx: &AppContext, cmd: McpCommands) -> Result<()> {
    match cmd {
        McpCommands::List { project } => {
            let servers = match &project {
                Some(p) => ctx.settings.effective_mcp_servers(p)?,
                None => ctx.settings.read()?.mcp_servers,
            };
            for (name, cfg) in servers {
                println!("{name}: {:?} {}", cfg.transport, cfg.command.or(cfg.url).unwrap_or_default());
            }
        }
        McpCommands::Add { name, command, url, transport, project } => {
            let transport = match transport {
                McpTransportArg::Stdio => TransportKind::Stdio,
                McpTransportArg::StreamableHttp => TransportKind::StreamableHttp,
                McpTransportArg::WebSocket => TransportKind::WebSocket,
            };
            let cfg = McpServerConfig {
                transport,
                command,
                args: Vec::new(),
                url,
                env: Default::default(),
                timeout_ms: 30_000,
            };
            match project {
                Some(p) => ctx.settings.mutate(move |doc| {
                    doc.projects.entry(p.clone()).or_default().mcp_servers.insert(name.clone(), cfg.clone());
                    Ok(())
                })?,
                None => ctx.settings.add_mcp_server(&name, cfg)?,
            }
        }
        McpCommands::Remove { name, project } => match project {
            Some(p) => ctx.settings.mutate(move |doc| {
                if let Some(record) = doc.projects.get_mut(&p) {
                    record.mcp_servers.remove(&name);
                }
                Ok(())
            })?,
            None => ctx.settings.remove_mcp_server(&name)?,
        },
    }
    Ok(())
}
