use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use zonesync_core::articles::ARTICLES_ZONE_NAME;
use zonesync_core::models::StatusKey;

#[derive(Parser)]
#[command(name = "zonesync")]
#[command(about = "Inspect and exercise zone sync state from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local state database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or clear stored change tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Manage pending local status changes
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },
    /// Push and pull articles between two clients over an in-memory service
    Simulate {
        /// Number of articles created on the sending client
        #[arg(long, default_value = "40")]
        articles: usize,
        /// Largest modify batch the simulated service accepts
        #[arg(long, value_name = "N")]
        batch_limit: Option<usize>,
        /// Inject throttling and transient failures
        #[arg(long)]
        faults: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ZoneArgs {
    /// Zone name
    #[arg(long, default_value = ARTICLES_ZONE_NAME)]
    pub zone: String,
    /// Zone owner (account id)
    #[arg(long)]
    pub owner: String,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show the stored change token
    Show(ZoneArgs),
    /// Clear the stored change token; the next fetch starts from scratch
    Reset(ZoneArgs),
    /// Move a token stored under the legacy key to the current key
    Migrate(ZoneArgs),
}

#[derive(Subcommand)]
pub enum StatusCommands {
    /// Record a pending status change for an article
    Mark {
        /// Article ID
        article_id: String,
        /// Status to change
        #[arg(long, value_enum)]
        key: StatusKeyArg,
        /// Clear the flag instead of setting it
        #[arg(long)]
        off: bool,
    },
    /// List pending status changes
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusKeyArg {
    Read,
    Starred,
    Deleted,
    New,
}

impl From<StatusKeyArg> for StatusKey {
    fn from(value: StatusKeyArg) -> Self {
        match value {
            StatusKeyArg::Read => Self::Read,
            StatusKeyArg::Starred => Self::Starred,
            StatusKeyArg::Deleted => Self::Deleted,
            StatusKeyArg::New => Self::New,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
