//! wenwenctl: operator CLI for the 高文文 daemon.

use anyhow::Result;
use clap::Parser;
use wenwenctl::cli::{Cli, Commands};
use wenwenctl::client::WenwenClient;
use wenwenctl::commands;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = WenwenClient::new(&cli.url);

    match cli.command {
        Commands::Classify { message, rules, json } => {
            commands::classify(&message, rules.as_deref(), json)
        }
        Commands::Chat { message, session, json } => {
            commands::chat(&client, &message, session, json).await
        }
        Commands::Stats { json } => commands::stats(&client, json).await,
        Commands::Health => commands::health(&client).await,
        Commands::Reset { token } => commands::reset(&client, token).await,
        Commands::ImportStores { file, db, approve } => {
            commands::import_stores(&file, &db, approve).map(|_| ())
        }
        Commands::CreateAdmin { username, db, password } => {
            commands::create_admin(&username, password, &db).map(|_| ())
        }
    }
}
