//! Command implementations.
//!
//! `classify` runs the classifier in-process. `import-stores` and
//! `create-admin` open the database file directly. Everything else talks
//! to a running daemon.

use crate::client::WenwenClient;
use crate::output;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;
use wenwen_shared::rules::RuleTable;
use wenwen_shared::{Approval, IntentClassifier, Store};
use wenwend::admin::StoreInput;
use wenwend::db::Database;

/// Environment variable read by `create-admin` when `--password` is absent
pub const ADMIN_PASSWORD_ENV: &str = "WENWEN_ADMIN_PASSWORD";

/// Environment variable read by `reset` when `--token` is absent
pub const ADMIN_TOKEN_ENV: &str = "WENWEN_ADMIN_TOKEN";

/// Explicit token, else the environment. Blank values count as missing.
pub fn admin_token(token: Option<String>) -> Result<String> {
    let token = token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| std::env::var(ADMIN_TOKEN_ENV).ok());
    match token {
        Some(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
        _ => bail!("No admin token given; log in via /admin/login and pass --token or set {}", ADMIN_TOKEN_ENV),
    }
}

pub fn classify(message: &str, rules: Option<&Path>, json: bool) -> Result<()> {
    let table = match rules {
        Some(path) => RuleTable::load(path)?,
        None => RuleTable::builtin()?,
    };
    let classification = IntentClassifier::new(table).classify(message)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    } else {
        print!("{}", output::classification(message, &classification));
    }
    Ok(())
}

pub async fn chat(client: &WenwenClient, message: &str, session: Option<String>, json: bool) -> Result<()> {
    let response = client.chat(message, session).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", output::chat(&response));
    }
    Ok(())
}

pub async fn stats(client: &WenwenClient, json: bool) -> Result<()> {
    let stats = client.stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", output::stats(&stats));
    }
    Ok(())
}

pub async fn health(client: &WenwenClient) -> Result<()> {
    print!("{}", output::health(&client.health().await?));
    Ok(())
}

pub async fn reset(client: &WenwenClient, token: Option<String>) -> Result<()> {
    let token = admin_token(token)?;
    print!("{}", output::reset(&client.daily_reset(&token).await?));
    Ok(())
}

/// Parse a JSON array of stores. Every entry is validated before anything
/// is written.
pub fn parse_store_import(text: &str, approve: bool) -> Result<Vec<Store>> {
    let inputs: Vec<StoreInput> =
        serde_json::from_str(text).context("Store file must be a JSON array of stores")?;

    let mut stores = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let mut store = input
            .into_store()
            .with_context(|| format!("Store #{} is invalid", index + 1))?;
        store.id = 0;
        if approve {
            store.approval = Approval::Approved;
        }
        stores.push(store);
    }
    Ok(stores)
}

/// Insert every store of `file` into the database. Returns the count.
pub fn import_stores(file: &Path, db_path: &Path, approve: bool) -> Result<usize> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let stores = parse_store_import(&text, approve)?;
    let db = Database::open(db_path)?;

    for store in &stores {
        db.insert_store(store)?;
    }
    info!("Imported {} stores into {}", stores.len(), db_path.display());
    println!("Imported {} stores", stores.len());
    Ok(stores.len())
}

pub fn create_admin(username: &str, password: Option<String>, db_path: &Path) -> Result<i64> {
    let password = match password.or_else(|| std::env::var(ADMIN_PASSWORD_ENV).ok()) {
        Some(p) if !p.is_empty() => p,
        _ => bail!("No password given; use --password or set {}", ADMIN_PASSWORD_ENV),
    };
    let db = Database::open(db_path)?;
    let id = db.create_admin(username, &password)?;
    println!("Created admin {} (id {})", username.trim(), id);
    Ok(id)
}
