//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-domain browsing time tracker.
///
/// Accounts focused time per web domain, classifies it as productive,
/// unproductive or neutral, and reports totals to a remote collector.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the tracking daemon, reading host events from stdin.
    Run,

    /// Show identity, rules and undelivered time.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show or change classification rules.
    #[command(subcommand)]
    Rules(RulesAction),

    /// Show or set the user identity.
    #[command(subcommand)]
    Identity(IdentityAction),

    /// Show the domain and classification for a URL.
    Classify {
        /// The page URL.
        url: String,
    },

    /// Fetch the weekly report from the collector.
    Report {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Rule subcommands.
#[derive(Debug, Subcommand)]
pub enum RulesAction {
    /// Print the current rule lists.
    Show {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replace both rule lists.
    Set {
        /// Productive domains (repeatable or comma-separated).
        #[arg(long, value_delimiter = ',')]
        productive: Vec<String>,

        /// Unproductive domains (repeatable or comma-separated).
        #[arg(long, value_delimiter = ',')]
        unproductive: Vec<String>,
    },
}

/// Identity subcommands.
#[derive(Debug, Subcommand)]
pub enum IdentityAction {
    /// Print the stored identity.
    Show,
    /// Store a new identity. A running daemon picks it up on its next poll.
    Set {
        /// Opaque user token.
        identity: String,
    },
}
