//! Chat pipeline: validate → identify → classify → retrieve → render → persist.
//!
//! Every branch ends in a rendered reply. Store names in the reply only
//! come from the retriever, and persistence runs after the reply exists.
//! The synchronous part of a turn runs on the blocking pool so SQLite never
//! stalls a runtime worker.

use crate::catalog::Catalog;
use crate::config::{ChatConfig, JobsConfig};
use crate::conversation::{clarification_change, is_follow_up, ConversationTracker};
use crate::db::TurnRecord;
use crate::jobs::{last_reset_at, next_reset_at};
use crate::metrics::ChatMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use wenwen_shared::api::{
    ChatRequest, ChatResponse, RecommendationLogic, ReplySource, UserMeta, UserProfile,
};
use wenwen_shared::error::{Result, WenwenError};
use wenwen_shared::faq::match_faq;
use wenwen_shared::{
    retrieve, Classification, Intent, IntentClassifier, RecommendationResult, ResponseRenderer,
    RetrievalOptions, Store, VERSION,
};

/// Storage failure surfaced at the API edge; details stay in the log
pub(crate) fn storage_error(context: &str, err: anyhow::Error) -> WenwenError {
    error!("{}: {:#}", context, err);
    WenwenError::Database(context.to_string())
}

/// Run synchronous storage work on the blocking pool
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WenwenError::Internal(format!("blocking task failed: {}", e)))?
}

/// Reply plus the pending write of the turn
pub struct ChatOutcome {
    pub response: ChatResponse,
    pub persisted: Option<JoinHandle<()>>,
}

/// Body of a reply before it is wrapped in a [`ChatResponse`]
struct Reply {
    text: String,
    logic: RecommendationLogic,
    stores: Vec<Store>,
}

pub struct ChatPipeline {
    classifier: IntentClassifier,
    renderer: ResponseRenderer,
    catalog: Arc<Catalog>,
    tracker: ConversationTracker,
    metrics: ChatMetrics,
    chat: ChatConfig,
    jobs: JobsConfig,
}

impl ChatPipeline {
    pub fn new(
        classifier: IntentClassifier,
        renderer: ResponseRenderer,
        catalog: Arc<Catalog>,
        metrics: ChatMetrics,
        chat: ChatConfig,
        jobs: JobsConfig,
    ) -> Self {
        let tracker = ConversationTracker::new(catalog.db().clone(), metrics.clone());
        Self {
            classifier,
            renderer,
            catalog,
            tracker,
            metrics,
            chat,
            jobs,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Answer one chat message
    pub async fn handle(self: &Arc<Self>, request: ChatRequest) -> Result<ChatOutcome> {
        let pipeline = Arc::clone(self);
        let (response, turn) = run_blocking(move || pipeline.respond(request)).await?;
        let persisted = turn.map(|turn| self.tracker.record(turn));
        Ok(ChatOutcome { response, persisted })
    }

    /// Everything up to the rendered reply, plus the turn to persist
    fn respond(&self, request: ChatRequest) -> Result<(ChatResponse, Option<TurnRecord>)> {
        let started = Instant::now();

        let message = request
            .message
            .ok_or_else(|| WenwenError::MissingField("message".to_string()))?;
        self.classifier.validate(&message.content)?;
        let content = message.content.trim().to_string();

        let session_id = request
            .session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let now = Utc::now();
        let profile = request.user_meta.as_ref().and_then(|meta| self.identify(meta));

        if let Some(profile) = &profile {
            if self.over_daily_limit(profile, now) {
                let reply = Reply {
                    text: self.renderer.daily_limit(),
                    logic: RecommendationLogic::unclassified(ReplySource::DailyLimit),
                    stores: Vec::new(),
                };
                let response = self.finish(reply, session_id, Intent::General, 0.0, started);
                return Ok((response, None));
            }
        }

        let previous = self.tracker.lookup(&session_id);
        let classification = self.classifier.classify(&content)?;
        let follow_up = is_follow_up(previous.as_ref(), classification.intent);

        info!(
            "Session {} classified as {} ({:.2}) keywords={:?}",
            session_id, classification.intent, classification.confidence, classification.matched_keywords
        );

        let reply = self.reply(&content, &classification, follow_up)?;
        let response = self.finish(
            reply,
            session_id.clone(),
            classification.intent,
            classification.confidence,
            started,
        );

        let turn = TurnRecord {
            session_id,
            user_profile_id: profile.as_ref().map(|p| p.id),
            user_message: content,
            assistant_message: response.response.clone(),
            intent: classification.intent,
            confidence: classification.confidence,
            at: now,
            clarification: clarification_change(previous.as_ref(), classification.intent),
        };
        Ok((response, Some(turn)))
    }

    /// Upsert the LINE user behind a message. Failures degrade to anonymous.
    fn identify(&self, meta: &UserMeta) -> Option<UserProfile> {
        let external_id = meta.external_id.trim();
        if external_id.is_empty() {
            return None;
        }
        match self.catalog.db().upsert_line_profile(
            external_id,
            meta.display_name.as_deref(),
            meta.avatar_url.as_deref(),
        ) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Could not upsert LINE user {}: {:#}", external_id, e);
                None
            }
        }
    }

    /// Blocked now, or no slot left in today's allowance (and blocked until
    /// the next reset). A slot is reserved atomically before the reply is
    /// built. Storage errors let the message through.
    fn over_daily_limit(&self, profile: &UserProfile, now: DateTime<Utc>) -> bool {
        if profile.is_blocked_at(now) {
            return true;
        }
        let limit = self.chat.daily_message_limit;
        if limit == 0 {
            return false;
        }

        let offset = self.jobs.offset();
        let window = last_reset_at(now, offset, self.jobs.reset_hour);
        match self.catalog.db().reserve_daily_message(profile.id, window, limit) {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                warn!("Could not reserve a message for profile {}: {:#}", profile.id, e);
                return false;
            }
        }

        let until = next_reset_at(now, offset, self.jobs.reset_hour);
        info!("Profile {} used all {} messages, blocked until {}", profile.id, limit, until);
        if let Err(e) = self.catalog.db().block_profile(profile.id, until) {
            warn!("Could not block profile {}: {:#}", profile.id, e);
        }
        true
    }

    fn reply(&self, content: &str, classification: &Classification, follow_up: bool) -> Result<Reply> {
        let intent = classification.intent;

        if intent == Intent::CoverageStats {
            let stats = self
                .catalog
                .coverage()
                .map_err(|e| storage_error("Failed to load coverage stats", e))?;
            return Ok(Reply {
                text: self.renderer.coverage(&stats),
                logic: RecommendationLogic::new(ReplySource::CoverageStats, classification, follow_up),
                stores: Vec::new(),
            });
        }

        if classification.all_partners || intent.lists_stores() {
            return self.recommend(classification, follow_up);
        }

        if matches!(intent, Intent::General | Intent::Directions) {
            let faqs = self
                .catalog
                .faqs()
                .map_err(|e| storage_error("Failed to load FAQs", e))?;
            if let Some(found) = match_faq(content, &faqs) {
                let mut logic = RecommendationLogic::new(ReplySource::Faq, classification, follow_up);
                logic.faq_id = Some(found.faq.id);
                return Ok(Reply {
                    text: self.renderer.faq(&found.faq.answer),
                    logic,
                    stores: Vec::new(),
                });
            }
        }

        Ok(Reply {
            text: self.renderer.conversational(classification),
            logic: RecommendationLogic::new(ReplySource::Template, classification, follow_up),
            stores: Vec::new(),
        })
    }

    fn recommend(&self, classification: &Classification, follow_up: bool) -> Result<Reply> {
        let stores = self
            .catalog
            .stores()
            .map_err(|e| storage_error("Failed to load stores", e))?;
        let options = RetrievalOptions {
            limit: self.chat.max_recommendations,
            follow_up,
        };
        let primary = retrieve(classification, &stores, &options);

        if let Some(other) = classification.mixed_with.as_deref() {
            let secondary = retrieve(
                other,
                &stores,
                &RetrievalOptions {
                    follow_up: false,
                    ..options
                },
            );
            let mut logic = RecommendationLogic::new(ReplySource::Mixed, classification, follow_up);
            logic.add_result(&primary);
            logic.add_result(&secondary);
            return Ok(Reply {
                text: self
                    .renderer
                    .mixed((classification, &primary), (other, &secondary)),
                logic,
                stores: collect_stores(&[&primary, &secondary]),
            });
        }

        let source = if primary.is_empty() {
            ReplySource::NotFound
        } else {
            ReplySource::Recommendation
        };
        let mut logic = RecommendationLogic::new(source, classification, follow_up);
        logic.add_result(&primary);
        Ok(Reply {
            text: self.renderer.recommendation(classification, &primary),
            logic,
            stores: collect_stores(&[&primary]),
        })
    }

    fn finish(
        &self,
        reply: Reply,
        session_id: String,
        intent: Intent,
        confidence: f32,
        started: Instant,
    ) -> ChatResponse {
        let elapsed = started.elapsed();
        self.metrics
            .record_reply(intent, reply.logic.source, elapsed.as_secs_f64());
        ChatResponse {
            response: reply.text,
            session_id,
            intent,
            confidence,
            recommended_stores: reply.stores,
            recommendation_logic: reply.logic,
            version: VERSION.to_string(),
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Stores of several results, first occurrence wins
fn collect_stores(results: &[&RecommendationResult]) -> Vec<Store> {
    let mut stores: Vec<Store> = Vec::new();
    for store in results.iter().flat_map(|r| r.stores()) {
        if !stores.iter().any(|s| s.id == store.id) {
            stores.push(store.clone());
        }
    }
    stores
}
