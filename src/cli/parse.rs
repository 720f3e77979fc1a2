//! CLI parse: clap types for coursegen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coursegen CLI - asynchronous course generation pipeline
#[derive(Parser, Debug)]
#[command(name = "coursegen")]
#[command(about = "Generate complete courses from a topic using a language model")]
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

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service and worker pool
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate a course in the foreground
    Generate {
        /// Course topic
        #[arg(long)]
        topic: String,
        /// Target audience
        #[arg(long)]
        audience: String,
        /// Number of modules (1-20)
        #[arg(long, default_value = "3", allow_negative_numbers = true)]
        modules: i64,
        /// User id recorded as the course author
        #[arg(long, default_value = "cli")]
        requester: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Inspect and retry generation jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Show a job, its failure log and course
    Show {
        /// Job id
        job_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List jobs, newest first
    List {
        /// Only jobs in this status (started, generating, persisting, published, error)
        #[arg(long)]
        status: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Re-run a failed job under the same id
    Retry {
        /// Job id
        job_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
