use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Browse a social-media relationship export on your own machine", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file, merged over the platform config directory.
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Database file, overriding the configured path.
    #[arg(long, global = true)]
    pub(crate) database: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest an export archive. Ctrl-C cancels without leaving a partial dataset.
    Ingest { archive: PathBuf },

    /// List ingested datasets, most recent first.
    Datasets,

    /// Show per-badge account counts.
    Stats {
        /// Dataset identity, or a unique prefix of it.
        dataset: String,
    },

    /// Search a dataset by username and badges.
    Search {
        dataset: String,
        /// Case-insensitive username substring.
        #[arg(short, long, default_value = "")]
        query: String,
        /// Badge to match (repeatable); accounts with any of them match.
        #[arg(short, long = "badge")]
        badges: Vec<String>,
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Print a page of a dataset in ingestion order.
    List {
        dataset: String,
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Interactive search: type a query per line, `:help` for commands.
    Browse {
        dataset: String,
        /// Rows per page.
        #[arg(long, default_value_t = 20)]
        page: usize,
    },

    /// Delete a dataset from the local store.
    Forget { dataset: String },
}
