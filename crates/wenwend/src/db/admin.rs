//! Back-office accounts and login sessions.

use super::{ts, Database};
use crate::admin::{hash_password, new_salt, new_token, passwords_match};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

impl Database {
    /// Create an admin account. Usernames are unique.
    pub fn create_admin(&self, username: &str, password: &str) -> Result<i64> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            bail!("Username and password must not be empty");
        }
        let salt = new_salt();
        let hash = hash_password(&salt, password);

        let conn = self.lock();
        conn.execute(
            "INSERT INTO admins (username, password_hash, salt, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, hash, salt, ts(Utc::now())],
        )
        .with_context(|| format!("Failed to create admin {}", username))?;
        Ok(conn.last_insert_rowid())
    }

    /// Admin id when the credentials are valid
    pub fn verify_admin(&self, username: &str, password: &str) -> Result<Option<i64>> {
        let conn = self.lock();
        let row: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT id, password_hash, salt FROM admins WHERE username = ?1",
                params![username.trim()],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        Ok(row.and_then(|(id, stored, salt)| {
            passwords_match(&stored, &hash_password(&salt, password)).then_some(id)
        }))
    }

    /// Start a session for `admin_id`. Returns the bearer token and expiry.
    pub fn create_admin_session(
        &self,
        admin_id: i64,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>)> {
        let token = new_token();
        let now = Utc::now();
        let expires_at = now + ttl;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO admin_sessions (token, admin_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![&token, admin_id, ts(expires_at), ts(now)],
        )?;
        Ok((token, expires_at))
    }

    /// Admin id behind a token that has not expired at `now`
    pub fn admin_for_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        let conn = self.lock();
        let admin_id = conn
            .query_row(
                "SELECT admin_id FROM admin_sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, ts(now)],
                |r| r.get(0),
            )
            .optional()?;
        Ok(admin_id)
    }

    pub fn delete_expired_admin_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM admin_sessions WHERE expires_at <= ?1",
            params![ts(now)],
        )?;
        Ok(deleted)
    }
}
