use anyhow::Result;
use clap::Parser;
use fnord_core::FnordError;
use fnord_settings::SettingsDocument;

mod ask_cmds;
mod cli;
mod config_cmds;
mod context;
mod conversations_cmds;
mod frobs_cmds;
mod index_cmds;
mod notes_cmds;
mod projects_cmds;
mod search_cmds;
mod torch_cmds;
mod upgrade_cmds;

use cli::{Cli, Commands, ConfigCommands, FrobsCommands, NotesCommands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;

    let (ctx, ui_queue) = context::AppContext::new(cli.quiet)?;

    if let Ok(doc) = ctx.settings.read() {
        if doc.version < SettingsDocument::CURRENT_VERSION {
            eprintln!(
                "WARNING: settings.json is at version {} (current is {}); it will be \
                 migrated automatically on next write.",
                doc.version,
                SettingsDocument::CURRENT_VERSION
            );
        }
    }

    let result = dispatch(&ctx, cli.command, format).await;

    ui_queue.shutdown();

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("error: {e:#}");
            let exit_code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<FnordError>())
                .map(FnordError::exit_code)
                .unwrap_or(1);
            std::process::exit(exit_code);
        }
    }
}

async fn dispatch(ctx: &context::AppContext, command: Commands, format: cli::OutputFormat) -> Result<()> {
    match command {
        Commands::Index { project, dir, exclude, reindex } => {
            index_cmds::handle_index(ctx, project, dir, exclude, reindex).await
        }
        Commands::Search { project, query, detail, limit } => {
            search_cmds::handle_search(ctx, project, query, detail, limit, format).await
        }
        Commands::Ask { project, question, rounds, follow, fork, edit, directory } => {
            ask_cmds::handle_ask(ctx, project, question, rounds, follow, fork, edit, directory).await
        }
        Commands::Conversations { project, prune } => {
            conversations_cmds::handle_conversations(ctx, project, prune).await
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::List => config_cmds::handle_list(ctx).await,
            ConfigCommands::Set { key, value } => config_cmds::handle_set(ctx, key, value).await,
            ConfigCommands::Approvals { project } => config_cmds::handle_approvals(ctx, project).await,
            ConfigCommands::Approve { pattern, scope } => config_cmds::handle_approve(ctx, pattern, scope).await,
            ConfigCommands::Mcp { cmd } => config_cmds::handle_mcp(ctx, cmd).await,
        },
        Commands::Files { project } => index_cmds::handle_files(ctx, project, format).await,
        Commands::Summary { project, file } => index_cmds::handle_summary(ctx, project, file).await,
        Commands::Notes { cmd } => match cmd {
            NotesCommands::List { project } => notes_cmds::handle_list(ctx, project).await,
            NotesCommands::Add { project, slug, content } => notes_cmds::handle_add(ctx, project, slug, content).await,
            NotesCommands::Remove { project, slug } => notes_cmds::handle_remove(ctx, project, slug).await,
        },
        Commands::Torch { project } => torch_cmds::handle_torch(ctx, project).await,
        Commands::Projects => projects_cmds::handle_projects(ctx).await,
        Commands::Upgrade => upgrade_cmds::handle_upgrade().await,
        Commands::Frobs { cmd } => match cmd {
            FrobsCommands::List { project } => frobs_cmds::handle_list(ctx, project).await,
            FrobsCommands::Install { source, global } => frobs_cmds::handle_install(ctx, source, global).await,
        },
    }
}
