use clap::{Parser, Subcommand};

/// Build version string combining Cargo.toml version and git describe.
fn build_version() -> &'static str {
    static VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| {
        let cargo_ver = env!("CARGO_PKG_VERSION");
        let git_desc = env!("FNORD_GIT_DESCRIBE");
        if git_desc.is_empty() {
            cargo_ver.to_string()
        } else {
            format!("{cargo_ver} ({git_desc})")
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "fnord", version = build_version())]
#[command(about = "Grounds an LLM in your codebase and notes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// (Re)index a project's source files.
    Index {
        #[arg(long)]
        project: String,
        #[arg(long)]
        dir: String,
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        #[arg(long)]
        reindex: bool,
    },
    /// Semantic search over an indexed project.
    Search {
        #[arg(long)]
        project: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        detail: bool,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Ask a grounded question, running the completion loop to terminal text.
    Ask {
        #[arg(long)]
        project: String,
        #[arg(long)]
        question: String,
        #[arg(long, default_value_t = 25)]
        rounds: usize,
        #[arg(long, conflicts_with = "fork")]
        follow: Option<String>,
        #[arg(long, conflicts_with = "follow")]
        fork: Option<String>,
        #[arg(long)]
        edit: bool,
        #[arg(long)]
        directory: Option<String>,
    },
    /// List or prune stored conversations.
    Conversations {
        #[arg(long)]
        project: String,
        #[arg(long)]
        prune: Option<i64>,
    },
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// List every indexed file in a project.
    Files {
        #[arg(long)]
        project: String,
    },
    /// Print the stored summary for one file.
    Summary {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: String,
    },
    Notes {
        #[command(subcommand)]
        cmd: NotesCommands,
    },
    /// Delete a project's index and stored conversations.
    Torch {
        #[arg(long)]
        project: String,
    },
    /// List known projects.
    Projects,
    /// Check for and report on available upgrades.
    Upgrade,
    Frobs {
        #[command(subcommand)]
        cmd: FrobsCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    List,
    Set { key: String, value: String },
    Approvals {
        #[arg(long)]
        project: Option<String>,
    },
    Approve {
        #[arg(long)]
        pattern: String,
        #[arg(long, value_enum)]
        scope: ApprovalScope,
    },
    Mcp {
        #[command(subcommand)]
        cmd: McpCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ApprovalScope {
    Session,
    Project,
    Global,
}

#[derive(Subcommand)]
pub enum McpCommands {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Add {
        name: String,
        #[arg(long)]
        command: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long, value_enum)]
        transport: McpTransportArg,
        #[arg(long)]
        project: Option<String>,
    },
    Remove {
        name: String,
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum McpTransportArg {
    Stdio,
    StreamableHttp,
    WebSocket,
}

#[derive(Subcommand)]
pub enum NotesCommands {
    List {
        #[arg(long)]
        project: String,
    },
    Add {
        #[arg(long)]
        project: String,
        slug: String,
        content: String,
    },
    Remove {
        #[arg(long)]
        project: String,
        slug: String,
    },
}

#[derive(Subcommand)]
pub enum FrobsCommands {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Install {
        source: String,
        #[arg(long)]
        global: bool,
    },
}
