//! Daily reset job.
//!
//! Runs once per local day at `jobs.reset_hour` (Asia/Taipei by default),
//! and on demand through `POST /jobs/daily-reset`. Every step is a
//! date-range update or delete, so running it twice is harmless.

use crate::config::JobsConfig;
use crate::db::Database;
use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};
use wenwen_shared::api::DailyResetSummary;

/// Most recent reset boundary at or before `now`
pub fn last_reset_at(now: DateTime<Utc>, offset: FixedOffset, reset_hour: u32) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let time = NaiveTime::from_hms_opt(reset_hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let boundary = local.date_naive().and_time(time);
    let boundary = Utc.from_utc_datetime(&(boundary - Duration::seconds(offset.local_minus_utc() as i64)));
    if boundary > now {
        boundary - Duration::days(1)
    } else {
        boundary
    }
}

/// First reset boundary strictly after `now`
pub fn next_reset_at(now: DateTime<Utc>, offset: FixedOffset, reset_hour: u32) -> DateTime<Utc> {
    last_reset_at(now, offset, reset_hour) + Duration::days(1)
}

/// Unblock users, prune stale rows, and summarise the local day that
/// ended at the last reset boundary.
pub fn run_daily_reset(
    db: &Database,
    jobs: &JobsConfig,
    now: DateTime<Utc>,
) -> Result<DailyResetSummary> {
    let offset = jobs.offset();
    let end = last_reset_at(now, offset, jobs.reset_hour);
    let start = end - Duration::days(1);

    let activity = db.turn_stats_between(start, end)?;
    let unblocked = db.unblock_expired(now)?;
    let allowances = db.delete_daily_usage_before(end)?;
    let clarifications =
        db.delete_clarifications_before(now - Duration::hours(jobs.clarification_retention_hours))?;
    let (sessions, messages) =
        db.delete_conversations_before(now - Duration::days(jobs.conversation_retention_days))?;
    let admin_sessions = db.delete_expired_admin_sessions(now)?;

    info!(
        "Daily reset: unblocked {} users, pruned {} allowances, {} clarifications, {} sessions, {} messages, {} admin sessions",
        unblocked, allowances, clarifications, sessions, messages, admin_sessions
    );

    let average = if activity.users == 0 {
        0.0
    } else {
        activity.conversations as f64 / activity.users as f64
    };

    Ok(DailyResetSummary {
        date: start.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        total_users: activity.users,
        total_conversations: activity.conversations,
        blocked_users: unblocked as u64,
        average_conversations_per_user: (average * 100.0).round() / 100.0,
    })
}

/// Run the reset at every boundary until the runtime shuts down
pub fn spawn_scheduler(db: Database, jobs: JobsConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_reset_at(now, jobs.offset(), jobs.reset_hour);
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next daily reset at {} (in {}s)", next.to_rfc3339(), wait.as_secs());
            tokio::time::sleep(wait).await;

            let db = db.clone();
            let jobs = jobs.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_daily_reset(&db, &jobs, Utc::now())).await;
            match outcome {
                Ok(Ok(summary)) => info!(
                    "Daily reset for {} done: {} users, {} conversations",
                    summary.date, summary.total_users, summary.total_conversations
                ),
                Ok(Err(e)) => error!("Daily reset failed: {:#}", e),
                Err(e) => error!("Daily reset task panicked: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ClarificationChange, TurnRecord};
    use wenwen_shared::Intent;

    fn taipei() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_reset_boundaries_follow_local_midnight() {
        // 2026-10-18 10:00 in Taipei
        let now = utc("2026-10-18T02:00:00Z");
        assert_eq!(last_reset_at(now, taipei(), 0), utc("2026-10-17T16:00:00Z"));
        assert_eq!(next_reset_at(now, taipei(), 0), utc("2026-10-18T16:00:00Z"));

        // 2026-10-18 01:30 in Taipei, reset at 03:00 local
        let early = utc("2026-10-17T17:30:00Z");
        assert_eq!(last_reset_at(early, taipei(), 3), utc("2026-10-16T19:00:00Z"));
        assert_eq!(next_reset_at(early, taipei(), 3), utc("2026-10-17T19:00:00Z"));
    }

    #[test]
    fn test_boundary_instant_counts_as_reset() {
        let boundary = utc("2026-10-17T16:00:00Z");
        assert_eq!(last_reset_at(boundary, taipei(), 0), boundary);
    }

    fn turn(session: &str, profile: Option<i64>, at: DateTime<Utc>, clarification: ClarificationChange) -> TurnRecord {
        TurnRecord {
            session_id: session.to_string(),
            user_profile_id: profile,
            user_message: "你好".to_string(),
            assistant_message: "嗨".to_string(),
            intent: Intent::VagueChat,
            confidence: 0.6,
            at,
            clarification,
        }
    }

    #[test]
    fn test_daily_reset_summary_and_idempotence() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobsConfig::default();
        let now = utc("2026-10-18T02:00:00Z");
        let yesterday = utc("2026-10-17T05:00:00Z");

        let a = db.upsert_line_profile("A", None, None).unwrap();
        let b = db.upsert_line_profile("B", None, None).unwrap();
        db.record_turn(&turn("s1", Some(a.id), yesterday, ClarificationChange::Unchanged)).unwrap();
        db.record_turn(&turn("s2", Some(a.id), now - Duration::hours(30), ClarificationChange::Open)).unwrap();
        db.record_turn(&turn("s3", Some(b.id), yesterday, ClarificationChange::Unchanged)).unwrap();
        db.record_turn(&turn("old", None, now - Duration::days(45), ClarificationChange::Unchanged)).unwrap();
        db.block_profile(b.id, last_reset_at(now, taipei(), 0)).unwrap();
        db.reserve_daily_message(a.id, last_reset_at(now, taipei(), 0) - Duration::days(1), 5).unwrap();
        db.reserve_daily_message(b.id, last_reset_at(now, taipei(), 0), 1).unwrap();

        let summary = run_daily_reset(&db, &jobs, now).unwrap();
        assert_eq!(summary.date, "2026-10-17");
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.total_conversations, 3);
        assert_eq!(summary.blocked_users, 1);
        assert_eq!(summary.average_conversations_per_user, 1.5);
        assert!(db.get_session("old").unwrap().is_none());
        assert_eq!(db.open_clarifications("s2").unwrap(), 0);
        // Only the stale allowance went away; B's slot for today is still used
        assert!(!db.reserve_daily_message(b.id, last_reset_at(now, taipei(), 0), 1).unwrap());
        let rows: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM daily_usage", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let again = run_daily_reset(&db, &jobs, now).unwrap();
        assert_eq!(again.blocked_users, 0);
        assert_eq!(again.total_conversations, 3);
    }

    #[test]
    fn test_daily_reset_on_empty_database() {
        let db = Database::open_in_memory().unwrap();
        let summary = run_daily_reset(&db, &JobsConfig::default(), Utc::now()).unwrap();
        assert_eq!(summary.total_users, 0);
        assert_eq!(summary.average_conversations_per_user, 0.0);
    }
}
