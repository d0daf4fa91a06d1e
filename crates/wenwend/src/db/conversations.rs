//! Chat sessions, messages and clarification rows.

use super::{row_ts, ts, Database};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use wenwen_shared::Intent;

/// Stored state of one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub user_profile_id: Option<i64>,
    pub message_count: i64,
    pub last_intent: Option<Intent>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// What a turn does to the session's pending clarification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClarificationChange {
    #[default]
    Unchanged,
    /// The bot asked the user to be more specific
    Open,
    /// The user followed up with something the bot could act on
    Resolve,
}

/// One user message and the reply it got
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub session_id: String,
    pub user_profile_id: Option<i64>,
    pub user_message: String,
    pub assistant_message: String,
    pub intent: Intent,
    pub confidence: f32,
    pub at: DateTime<Utc>,
    pub clarification: ClarificationChange,
}

/// Activity inside a time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnStats {
    /// Distinct registered users who sent a message
    pub users: u64,
    /// Distinct sessions with a user message
    pub conversations: u64,
}

impl Database {
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock();
        let session = conn
            .query_row(
                r#"
                SELECT id, user_profile_id, message_count, last_intent, created_at, last_activity
                FROM chat_sessions WHERE id = ?1
                "#,
                params![id],
                |row| {
                    let last_intent: Option<String> = row.get(3)?;
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        user_profile_id: row.get(1)?,
                        message_count: row.get(2)?,
                        last_intent: last_intent.and_then(|s| s.parse().ok()),
                        created_at: row_ts(4, row.get(4)?)?,
                        last_activity: row_ts(5, row.get(5)?)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to read session {}", id))?;
        Ok(session)
    }

    /// Persist a turn: create or bump the session (+2 messages), append both
    /// messages and apply the clarification change, in one transaction.
    pub fn record_turn(&self, turn: &TurnRecord) -> Result<()> {
        let at = ts(turn.at);
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO chat_sessions
                (id, user_profile_id, message_count, last_intent, created_at, last_activity)
            VALUES (?1, ?2, 2, ?3, ?4, ?4)
            ON CONFLICT(id) DO UPDATE SET
                message_count = message_count + 2,
                last_intent = excluded.last_intent,
                last_activity = excluded.last_activity,
                user_profile_id = COALESCE(excluded.user_profile_id, chat_sessions.user_profile_id)
            "#,
            params![&turn.session_id, turn.user_profile_id, turn.intent.as_str(), &at],
        )?;

        tx.execute(
            r#"
            INSERT INTO chat_messages (session_id, role, content, intent, confidence, created_at)
            VALUES (?1, 'user', ?2, ?3, ?4, ?5)
            "#,
            params![
                &turn.session_id,
                &turn.user_message,
                turn.intent.as_str(),
                turn.confidence as f64,
                &at
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO chat_messages (session_id, role, content, created_at)
            VALUES (?1, 'assistant', ?2, ?3)
            "#,
            params![&turn.session_id, &turn.assistant_message, &at],
        )?;

        match turn.clarification {
            ClarificationChange::Unchanged => {}
            ClarificationChange::Open => {
                tx.execute(
                    r#"
                    INSERT INTO clarification_sessions (session_id, original_message, created_at)
                    VALUES (?1, ?2, ?3)
                    "#,
                    params![&turn.session_id, &turn.user_message, &at],
                )?;
            }
            ClarificationChange::Resolve => {
                tx.execute(
                    r#"
                    UPDATE clarification_sessions SET resolved_at = ?2
                    WHERE session_id = ?1 AND resolved_at IS NULL
                    "#,
                    params![&turn.session_id, &at],
                )?;
            }
        }

        tx.commit()
            .with_context(|| format!("Failed to record turn for session {}", turn.session_id))
    }

    /// Clarifications still waiting for an answer in a session
    pub fn open_clarifications(&self, session_id: &str) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM clarification_sessions WHERE session_id = ?1 AND resolved_at IS NULL",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Users and conversations with a user message in `[start, end)`
    pub fn turn_stats_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TurnStats> {
        let conn = self.lock();
        let (users, conversations): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(DISTINCT s.user_profile_id), COUNT(DISTINCT m.session_id)
            FROM chat_messages m
            JOIN chat_sessions s ON s.id = m.session_id
            WHERE m.role = 'user' AND m.created_at >= ?1 AND m.created_at < ?2
            "#,
            params![ts(start), ts(end)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TurnStats {
            users: users as u64,
            conversations: conversations as u64,
        })
    }

    /// Retention sweep: messages older than `cutoff` and sessions idle since
    /// before it. Returns (sessions, messages) deleted.
    pub fn delete_conversations_before(&self, cutoff: DateTime<Utc>) -> Result<(usize, usize)> {
        let cutoff = ts(cutoff);
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut messages = tx.execute(
            r#"
            DELETE FROM chat_messages WHERE session_id IN
                (SELECT id FROM chat_sessions WHERE last_activity < ?1)
            "#,
            params![&cutoff],
        )?;
        messages += tx.execute(
            "DELETE FROM chat_messages WHERE created_at < ?1",
            params![&cutoff],
        )?;
        let sessions = tx.execute(
            "DELETE FROM chat_sessions WHERE last_activity < ?1",
            params![&cutoff],
        )?;

        tx.commit().context("Failed to delete old conversations")?;
        Ok((sessions, messages))
    }

    pub fn delete_clarifications_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM clarification_sessions WHERE created_at < ?1",
            params![ts(cutoff)],
        )?;
        Ok(deleted)
    }
}
