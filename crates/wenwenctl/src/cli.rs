//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 高文文 control tool
#[derive(Parser, Debug)]
#[command(name = "wenwenctl")]
#[command(about = "高文文 - 文山特區 chatbot control tool", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Daemon base URL
    #[arg(long, global = true, default_value = crate::DEFAULT_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a message locally, without the daemon
    Classify {
        message: String,

        /// Rule table to use instead of the built-in one
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Send a message to the daemon and print the reply
    Chat {
        message: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Show catalogue coverage statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Show daemon health
    Health,

    /// Run the daily reset job now
    Reset {
        /// Admin session token (read from WENWEN_ADMIN_TOKEN when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Import stores from a JSON array into the database
    ImportStores {
        /// JSON file with an array of stores
        file: PathBuf,

        /// Database file
        #[arg(long)]
        db: PathBuf,

        /// Mark imported stores as approved
        #[arg(long)]
        approve: bool,
    },

    /// Create a back-office admin account
    CreateAdmin {
        username: String,

        /// Database file
        #[arg(long)]
        db: PathBuf,

        /// Password (read from WENWEN_ADMIN_PASSWORD when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}
