//! Command-line interface definition for convlog
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to save, query, and summarize conversation logs and
//! to serve them over stdio.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// convlog - conversation log store
///
/// Appends conversation messages to date-partitioned JSONL files and
/// answers filtered queries over them.
#[derive(Parser, Debug, Clone)]
#[command(name = "convlog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Directory holding partition files (overrides config)
    #[arg(long, env = "CONVLOG_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for convlog
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Append a batch of messages to today's partition
    Save {
        /// JSON array of {role, content} objects, or `-` to read from stdin
        #[arg(short, long)]
        messages: String,

        /// Session to append to; generated when omitted
        #[arg(long)]
        session_id: Option<String>,

        /// User the messages belong to
        #[arg(long)]
        user_id: Option<String>,

        /// JSON object stored with every entry
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Search stored entries, most recent partitions first
    Query {
        /// Exact session id
        #[arg(long)]
        session_id: Option<String>,

        /// Exact user id
        #[arg(long)]
        user_id: Option<String>,

        /// Case-insensitive substring of the message
        #[arg(short, long)]
        keyword: Option<String>,

        /// Inclusive lower bound on the timestamp (ISO-8601)
        #[arg(long)]
        start_date: Option<String>,

        /// Inclusive upper bound on the timestamp (ISO-8601)
        #[arg(long)]
        end_date: Option<String>,

        /// Maximum entries to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Summarize sessions across all partitions
    Sessions {
        /// Maximum sessions to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the tool definitions exposed by `serve`
    Tools,

    /// Serve JSON-RPC tool calls over stdin/stdout
    Serve,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
