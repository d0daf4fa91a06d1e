//! wenwenctl: operator CLI for the 高文文 daemon.

pub mod cli;
pub mod client;
pub mod commands;
pub mod output;

/// Daemon address used when `--url` is not given
pub const DEFAULT_URL: &str = "http://127.0.0.1:8787";
