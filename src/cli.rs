use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::aggregate::ThreadFilter;

/// Command-line options for spamguard.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file. Defaults to `spamguard.db` in the data directory.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory holding `spam_model.json` and `tokenizer.json`.
    #[arg(long, global = true)]
    pub assets: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import messages from a JSON array, then score them.
    Import {
        file: PathBuf,
        /// Do not surface notifications for the imported messages.
        #[arg(long)]
        no_notify: bool,
    },
    /// Score every message that has no score yet.
    Score,
    /// List conversations.
    Threads {
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Classify a single text without storing it.
    Classify { text: String },
    /// Print one conversation and mark it read.
    Show { conversation: i64 },
    /// Delete whole conversations.
    Delete {
        #[arg(required = true)]
        conversations: Vec<i64>,
    },
    /// Keep scoring and print live conversation counts until Ctrl-C.
    Watch {
        /// Seconds between checks for messages written by other processes.
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterArg {
    All,
    Normal,
    Spam,
}

impl From<FilterArg> for ThreadFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => ThreadFilter::All,
            FilterArg::Normal => ThreadFilter::Normal,
            FilterArg::Spam => ThreadFilter::Spam,
        }
    }
}
