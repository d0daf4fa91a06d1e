//! LINE users and user profiles.

use super::{row_ts, ts, Database};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use wenwen_shared::api::UserProfile;

const PROFILE_COLUMNS: &str =
    "id, line_user_id, display_name, avatar_url, is_blocked, blocked_until, created_at, updated_at";

fn profile_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    let blocked_until: Option<String> = row.get(5)?;
    Ok(UserProfile {
        id: row.get(0)?,
        line_user_id: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        is_blocked: row.get(4)?,
        blocked_until: blocked_until.map(|raw| row_ts(5, raw)).transpose()?,
        created_at: row_ts(6, row.get(6)?)?,
        updated_at: row_ts(7, row.get(7)?)?,
    })
}

impl Database {
    /// Create or refresh the LINE user and its profile. Missing display
    /// fields keep their stored values.
    pub fn upsert_line_profile(
        &self,
        line_uid: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<UserProfile> {
        let now = ts(Utc::now());
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO line_users (line_uid, display_name, avatar_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(line_uid) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, line_users.display_name),
                avatar_url = COALESCE(excluded.avatar_url, line_users.avatar_url),
                updated_at = excluded.updated_at
            "#,
            params![line_uid, display_name, avatar_url, &now],
        )?;
        tx.execute(
            r#"
            INSERT INTO user_profiles (line_user_id, display_name, avatar_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(line_user_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, user_profiles.display_name),
                avatar_url = COALESCE(excluded.avatar_url, user_profiles.avatar_url),
                updated_at = excluded.updated_at
            "#,
            params![line_uid, display_name, avatar_url, &now],
        )?;

        let profile = tx.query_row(
            &format!("SELECT {} FROM user_profiles WHERE line_user_id = ?1", PROFILE_COLUMNS),
            params![line_uid],
            profile_from_row,
        )?;
        tx.commit()
            .with_context(|| format!("Failed to upsert LINE user {}", line_uid))?;
        Ok(profile)
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<UserProfile>> {
        let conn = self.lock();
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM user_profiles WHERE id = ?1", PROFILE_COLUMNS),
                params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Block a profile until `until`
    pub fn block_profile(&self, id: i64, until: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE user_profiles SET is_blocked = 1, blocked_until = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
            params![id, ts(until), ts(Utc::now())],
        )?;
        Ok(changed > 0)
    }

    /// Lift every block that ended at or before `now`. Blocks without an end
    /// date are left alone.
    pub fn unblock_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = ts(now);
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE user_profiles SET is_blocked = 0, blocked_until = NULL, updated_at = ?1
            WHERE is_blocked = 1 AND blocked_until IS NOT NULL AND blocked_until <= ?1
            "#,
            params![&now],
        )?;
        Ok(changed)
    }

    /// Take one message slot from the profile's allowance for the window
    /// starting at `window_start`. Returns false when all `limit` slots are
    /// used. Check and increment happen in one transaction under the
    /// connection lock, so concurrent requests cannot share a slot.
    pub fn reserve_daily_message(
        &self,
        profile_id: i64,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<bool> {
        let window = ts(window_start);
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let stored: Option<(String, i64)> = tx
            .query_row(
                "SELECT window_start, messages FROM daily_usage WHERE user_profile_id = ?1",
                params![profile_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        // A row from an earlier window starts over
        let used = match stored {
            Some((start, messages)) if start == window => messages.max(0) as u64,
            _ => 0,
        };
        if used >= limit {
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO daily_usage (user_profile_id, window_start, messages)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_profile_id) DO UPDATE SET
                window_start = excluded.window_start,
                messages = excluded.messages
            "#,
            params![profile_id, &window, (used + 1) as i64],
        )?;
        tx.commit()
            .with_context(|| format!("Failed to reserve a message for profile {}", profile_id))?;
        Ok(true)
    }

    /// Drop allowance rows of windows that started before `window_start`
    pub fn delete_daily_usage_before(&self, window_start: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM daily_usage WHERE window_start < ?1",
            params![ts(window_start)],
        )?;
        Ok(deleted)
    }

    pub fn count_profiles(&self) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_profiles", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_upsert_keeps_existing_fields() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .upsert_line_profile("U123", Some("小明"), Some("https://img/a.png"))
            .unwrap();
        let again = db.upsert_line_profile("U123", None, None).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.display_name.as_deref(), Some("小明"));
        assert_eq!(again.avatar_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(again.line_user_id.as_deref(), Some("U123"));
        assert_eq!(db.count_profiles().unwrap(), 1);

        let renamed = db.upsert_line_profile("U123", Some("大明"), None).unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("大明"));
    }

    #[test]
    fn test_block_and_unblock() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let a = db.upsert_line_profile("A", None, None).unwrap();
        let b = db.upsert_line_profile("B", None, None).unwrap();
        let c = db.upsert_line_profile("C", None, None).unwrap();

        db.block_profile(a.id, now - Duration::minutes(1)).unwrap();
        db.block_profile(b.id, now + Duration::hours(5)).unwrap();
        db.lock()
            .execute("UPDATE user_profiles SET is_blocked = 1 WHERE id = ?1", params![c.id])
            .unwrap();

        assert_eq!(db.unblock_expired(now).unwrap(), 1);
        assert!(!db.get_profile(a.id).unwrap().unwrap().is_blocked);
        assert!(db.get_profile(b.id).unwrap().unwrap().is_blocked_at(now));
        assert!(db.get_profile(c.id).unwrap().unwrap().is_blocked_at(now));
        assert_eq!(db.unblock_expired(now).unwrap(), 0);
    }

    #[test]
    fn test_daily_allowance_resets_with_window() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_line_profile("A", None, None).unwrap();
        let b = db.upsert_line_profile("B", None, None).unwrap();
        let today = Utc::now() - Duration::hours(2);
        let yesterday = today - Duration::days(1);

        assert!(db.reserve_daily_message(a.id, yesterday, 2).unwrap());
        assert!(db.reserve_daily_message(a.id, yesterday, 2).unwrap());
        assert!(!db.reserve_daily_message(a.id, yesterday, 2).unwrap());

        // New window, fresh allowance; other profiles are separate
        assert!(db.reserve_daily_message(a.id, today, 2).unwrap());
        assert!(db.reserve_daily_message(b.id, yesterday, 1).unwrap());
        assert!(!db.reserve_daily_message(b.id, yesterday, 1).unwrap());

        assert_eq!(db.delete_daily_usage_before(today).unwrap(), 1);
        assert!(db.reserve_daily_message(a.id, today, 2).unwrap());
        assert!(!db.reserve_daily_message(a.id, today, 2).unwrap());
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_limit() {
        let db = Database::open_in_memory().unwrap();
        let id = db.upsert_line_profile("burst", None, None).unwrap().id;
        let window = Utc::now();

        let granted: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let db = db.clone();
                    scope.spawn(move || {
                        (0..5)
                            .filter(|_| db.reserve_daily_message(id, window, 10).unwrap())
                            .count()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(granted, 10);
    }
}
