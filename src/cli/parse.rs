//! CLI parse: clap types for wdctx. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wdctx - working-directory context resolution
#[derive(Parser)]
#[command(name = "wdctx")]
#[command(about = "Resolve which repository a workspace is working in")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the repository root containing a path
    Find {
        path: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Resolve the active working directory for a set of open projects
    Resolve {
        /// Open project path (repeatable)
        #[arg(long = "project")]
        projects: Vec<PathBuf>,
        /// File or directory in the focused pane
        #[arg(long)]
        active: Option<PathBuf>,
        /// File or directory in the center area's focused pane
        #[arg(long)]
        center: Option<PathBuf>,
        /// Do not persist saved state afterwards
        #[arg(long)]
        no_save: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create a directory with a new repository and make it the active project
    Init { path: PathBuf },
    /// Clone a remote into a directory and make it the active project
    Clone { url: String, path: PathBuf },
    /// Print the effective configuration
    Config,
}
