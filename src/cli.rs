// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gstin-lookup",
    version,
    about = "GSTIN registry lookup service with ordered API key rotation"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "GSTIN_LOOKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server port (overrides the configuration file)
    #[arg(short, long, env = "GSTIN_LOOKUP_PORT")]
    pub port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "GSTIN_LOOKUP_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the lookup server (default)
    Serve,

    /// Perform a one-shot lookup and print the registry payload
    Check {
        /// GSTIN to look up
        #[arg(value_name = "GSTIN")]
        gstin: String,

        /// Override attempts per key
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Validate configuration and report the loaded settings
    Config {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}
