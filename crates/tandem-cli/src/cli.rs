use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tandem",
    about = "Tandem: version control for JSON documents",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the content digest of a JSON document
    Digest(DigestArgs),
    /// Create a repository file from an initial snapshot
    Init(InitArgs),
    /// Append a snapshot to a repository
    Commit(CommitArgs),
    /// Show commit history, newest first
    Log(LogArgs),
    /// List or create branches
    Branch(BranchArgs),
    /// Verify snapshot ids, commit ids, the parent chain and branch heads
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct DigestArgs {
    /// JSON file; reads stdin when omitted
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Repository file to create
    pub repo: PathBuf,
    /// Document id
    #[arg(long)]
    pub id: String,
    /// Initial snapshot; an empty object when omitted
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    #[arg(long)]
    pub author: Option<String>,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CommitArgs {
    pub repo: PathBuf,
    /// Snapshot file
    pub snapshot: PathBuf,
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    pub repo: PathBuf,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct BranchArgs {
    pub repo: PathBuf,
    /// Branch to create; lists branches when omitted
    pub name: Option<String>,
    /// Commit id or unique prefix; the latest commit when omitted
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub repo: PathBuf,
}
