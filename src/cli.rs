use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::history::{RecordStatus, SortKey, SortOrder};
use crate::report::ExportFormat;

#[derive(Parser, Debug)]
#[command(
    name = "research-monitor",
    version,
    about = "Monitor research tasks and keep a local history of results"
)]
pub struct Cli {
    /// Path to config file (overrides ./research-monitor.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Research service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory holding the history file
    #[arg(long, global = true)]
    pub history_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a research task and follow it to completion
    Run {
        /// The research question
        #[arg(short, long)]
        query: String,

        /// Number of agents the executor may use (1-5)
        #[arg(long, default_value_t = 3)]
        max_agents: u8,

        /// Planning iterations (2-10)
        #[arg(long, default_value_t = 5)]
        max_iterations: u8,

        /// Base poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Write a JSON export of the result into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Inspect and curate the local history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Fetch a finished task's result and export it
    Export {
        /// Task id as reported by `run` or `history list`
        task_id: String,

        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List records, newest first by default
    List {
        /// Case-insensitive substring of the query
        #[arg(short, long)]
        search: Option<String>,

        /// completed, failed or running
        #[arg(long)]
        status: Option<RecordStatus>,

        /// timestamp, duration, sources or query
        #[arg(long, default_value = "timestamp")]
        sort: SortKey,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Only favorites
        #[arg(long)]
        favorites: bool,
    },
    /// Toggle the favorite flag on a record
    Favorite { id: String },
    /// Delete one or more records
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Summary counts over the whole history
    Stats,
}
