use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kit",
    about = "Mirror structured objects into a Git repository, one commit per change",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the Git repository
    #[arg(short, long, global = true, env = "KIT_REPOSITORY")]
    pub repository: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "KIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Commit author name
    #[arg(long, global = true, env = "KIT_AUTHOR_NAME")]
    pub author_name: Option<String>,

    /// Commit author email
    #[arg(long, global = true, env = "KIT_AUTHOR_EMAIL")]
    pub author_email: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store an object (YAML or JSON) and commit the change
    Write(ObjectArgs),
    /// Remove a stored object and commit the removal
    Delete(ObjectArgs),
    /// Apply a JSON-lines stream of write/delete events
    Apply(ApplyArgs),
    /// Print a stored object
    Show(ShowArgs),
    /// List stored objects
    List(ListArgs),
    /// Show commit history
    Log(LogArgs),
}

#[derive(Args)]
pub struct ObjectArgs {
    /// Classification used as the middle path segment (e.g. pod, service)
    pub group: String,
    /// Document to read; stdin when omitted or `-`
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Event stream to read; stdin when omitted or `-`
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub group: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long)]
    pub group: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}
