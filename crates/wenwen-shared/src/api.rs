//! HTTP request and response bodies shared by the daemon and the CLI.

use crate::classifier::Classification;
use crate::intent::{Intent, MedicalKind};
use crate::retriever::{EvidenceLevel, RecommendationResult};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Messaging-platform identity attached to a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserMeta {
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `POST /chat` body. Fields are optional so missing ones get a coded error
/// instead of a bare deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub user_meta: Option<UserMeta>,
}

/// Where the reply text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Recommendation,
    NotFound,
    Mixed,
    CoverageStats,
    Faq,
    Template,
    DailyLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEvidence {
    pub store_id: i64,
    pub name: String,
    pub matched_tags: Vec<String>,
    pub evidence_level: EvidenceLevel,
    pub boosted: bool,
}

/// Explanation of how the reply was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationLogic {
    pub source: ReplySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub matched_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_kind: Option<MedicalKind>,
    pub tag_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixed_with: Option<Intent>,
    pub all_partners: bool,
    pub follow_up: bool,
    pub candidate_count: usize,
    pub evidence: Vec<StoreEvidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faq_id: Option<i64>,
}

impl RecommendationLogic {
    pub fn new(source: ReplySource, classification: &Classification, follow_up: bool) -> Self {
        Self {
            source,
            rule: classification.rule.clone(),
            matched_keywords: classification.matched_keywords.clone(),
            medical_kind: classification.medical_kind,
            tag_terms: classification.tag_terms.clone(),
            mixed_with: classification.mixed_with.as_ref().map(|m| m.intent),
            all_partners: classification.all_partners,
            follow_up,
            candidate_count: 0,
            evidence: Vec::new(),
            faq_id: None,
        }
    }

    /// Logic for a reply produced without classifying the message
    pub fn unclassified(source: ReplySource) -> Self {
        Self {
            source,
            rule: None,
            matched_keywords: Vec::new(),
            medical_kind: None,
            tag_terms: Vec::new(),
            mixed_with: None,
            all_partners: false,
            follow_up: false,
            candidate_count: 0,
            evidence: Vec::new(),
            faq_id: None,
        }
    }

    /// Record the stores of a retrieval result
    pub fn add_result(&mut self, result: &RecommendationResult) {
        self.candidate_count += result.candidate_count;
        self.evidence.extend(result.items.iter().map(|item| StoreEvidence {
            store_id: item.store.id,
            name: item.store.name.clone(),
            matched_tags: item.matched_tags.clone(),
            evidence_level: item.evidence_level,
            boosted: item.boosted,
        }));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub intent: Intent,
    pub confidence: f32,
    pub recommended_stores: Vec<Store>,
    pub recommendation_logic: RecommendationLogic,
    pub version: String,
    pub processing_time_ms: u64,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub line_user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub is_blocked: bool,
    #[serde(default)]
    pub blocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Blocked at `now`. A block without an end date never lapses on its own.
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.is_blocked && self.blocked_until.map(|until| until > now).unwrap_or(true)
    }
}

/// `POST /register` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub line_uid: Option<String>,
    #[serde(default)]
    pub line_display_name: Option<String>,
    #[serde(default)]
    pub line_avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserProfile,
    pub message: String,
}

// ============================================================================
// Jobs, health, errors
// ============================================================================

/// Daily reset job summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyResetSummary {
    pub date: String,
    pub total_users: u64,
    pub total_conversations: u64,
    pub blocked_users: u64,
    pub average_conversations_per_user: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub rules_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// `{error: {code, message}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    pub fn from_error(err: &crate::WenwenError) -> Self {
        Self {
            error: ErrorDetail {
                code: err.code().to_string(),
                message: err.user_message(),
            },
        }
    }
}
