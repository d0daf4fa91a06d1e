//! Conversation state tracker.
//!
//! Reads the previous turn of a session for follow-up detection and writes
//! each finished turn after the reply has been built. Storage failures are
//! logged and counted; they never reach the user.

use crate::db::{ClarificationChange, Database, SessionRecord, TurnRecord};
use crate::metrics::ChatMetrics;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wenwen_shared::Intent;

#[derive(Clone)]
pub struct ConversationTracker {
    db: Database,
    metrics: ChatMetrics,
}

impl ConversationTracker {
    pub fn new(db: Database, metrics: ChatMetrics) -> Self {
        Self { db, metrics }
    }

    /// Stored session, or None when it is new or cannot be read
    pub fn lookup(&self, session_id: &str) -> Option<SessionRecord> {
        match self.db.get_session(session_id) {
            Ok(session) => session,
            Err(e) => {
                warn!("Session lookup failed for {}: {:#}", session_id, e);
                None
            }
        }
    }

    /// Persist a turn on the blocking pool. The handle is only awaited by tests.
    pub fn record(&self, turn: TurnRecord) -> JoinHandle<()> {
        let db = self.db.clone();
        let metrics = self.metrics.clone();
        tokio::task::spawn_blocking(move || match db.record_turn(&turn) {
            Ok(()) => debug!("Recorded turn for session {}", turn.session_id),
            Err(e) => {
                metrics.record_persistence_failure();
                warn!("Failed to persist turn for session {}: {:#}", turn.session_id, e);
            }
        })
    }
}

/// Same intent as the previous turn of this session
pub fn is_follow_up(previous: Option<&SessionRecord>, intent: Intent) -> bool {
    previous.and_then(|s| s.last_intent) == Some(intent)
}

/// Clarification bookkeeping for a turn: a GENERAL fallback asks the user
/// to be more specific; a later store request answers it.
pub fn clarification_change(previous: Option<&SessionRecord>, intent: Intent) -> ClarificationChange {
    if intent == Intent::General {
        ClarificationChange::Open
    } else if previous.and_then(|s| s.last_intent) == Some(Intent::General) && intent.lists_stores() {
        ClarificationChange::Resolve
    } else {
        ClarificationChange::Unchanged
    }
}
