//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Finsight - Understand where your money goes
#[derive(Parser)]
#[command(name = "finsight")]
#[command(about = "Self-hosted bank statement analyzer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finsight.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINSIGHT_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Import a bank statement (CSV or PDF)
    Import {
        /// Statement file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Username that owns the transactions
        #[arg(short, long)]
        user: String,

        /// Bank: sbi, hdfc, axis (auto-detected from CSV headers if not specified)
        #[arg(short, long)]
        bank: Option<String>,
    },

    /// Show totals and cash flow
    Stats {
        #[arg(short, long)]
        user: String,
    },

    /// List transactions unusual for their category
    Anomalies {
        #[arg(short, long)]
        user: String,
    },

    /// Project this month's spending to month end
    Projections {
        #[arg(short, long)]
        user: String,
    },

    /// List recurring transactions
    Recurring {
        #[arg(short, long)]
        user: String,
    },

    /// Write the PDF financial report
    Report {
        #[arg(short, long)]
        user: String,

        /// Output file
        #[arg(short, long, default_value = "Financial_Report.pdf")]
        output: PathBuf,
    },

    /// Train the categorizer model on a user's transactions
    ///
    /// The model is written to FINSIGHT_MODEL_PATH (default finsight-model.json).
    Train {
        #[arg(short, long)]
        user: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    ///
    /// The password is read from FINSIGHT_PASSWORD, or prompted for on stdin.
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,
    },

    /// List users
    List,
}
