//! CLI definitions for storebridge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// storebridge CLI.
#[derive(Parser)]
#[command(name = "storebridge")]
#[command(about = "Versioned facade over a web app's internal modules, driven over CDP")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/storebridge.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Bind the facade and keep the session alive (default)
    Run,

    /// Subscribe to and read the presence of one contact
    Presence {
        /// Contact id, e.g. 15551234567@c.us
        wid: String,
    },

    /// Version cache commands
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Resolve a version through the configured cache
    Resolve {
        version: String,

        /// Print the snapshot content instead of a summary
        #[arg(long)]
        print: bool,
    },

    /// Store a snapshot file as the given version
    Import {
        version: String,

        /// Raw bundle HTML
        file: PathBuf,
    },

    /// List versions in the local cache
    List,
}
