//! Plain-text rendering of command results.

use wenwen_shared::api::{ChatResponse, DailyResetSummary, HealthResponse};
use wenwen_shared::{Classification, CoverageStats};

pub fn classification(message: &str, c: &Classification) -> String {
    let mut out = String::new();
    out.push_str(&format!("message:     {}\n", message));
    out.push_str(&format!("intent:      {} ({:.2})\n", c.intent, c.confidence));
    if let Some(rule) = &c.rule {
        out.push_str(&format!("rule:        {}\n", rule));
    }
    if !c.matched_keywords.is_empty() {
        out.push_str(&format!("keywords:    {}\n", c.matched_keywords.join(", ")));
    }
    if let Some(kind) = c.medical_kind {
        out.push_str(&format!("medical:     {}\n", kind.label()));
    }
    if !c.tag_terms.is_empty() {
        out.push_str(&format!("tag filter:  {}\n", c.tag_terms.join(", ")));
    }
    if let Some(other) = &c.mixed_with {
        out.push_str(&format!("mixed with:  {}\n", other.intent));
    }
    if c.all_partners {
        out.push_str("partners:    all\n");
    }
    out
}

pub fn chat(resp: &ChatResponse) -> String {
    let mut out = String::new();
    out.push_str(&resp.response);
    out.push_str("\n\n");
    out.push_str(&format!(
        "[{} {:.2} | {} stores | session {} | {} ms]\n",
        resp.intent,
        resp.confidence,
        resp.recommended_stores.len(),
        resp.session_id,
        resp.processing_time_ms
    ));
    out
}

pub fn stats(s: &CoverageStats) -> String {
    format!(
        "Stores:     {}\nTrusted:    {}\nDiscount:   {}\nPartners:   {}\nCategories: {}\n",
        s.total_stores, s.trusted_stores, s.discount_stores, s.partner_stores, s.category_count
    )
}

pub fn health(h: &HealthResponse) -> String {
    format!(
        "Status:  {}\nVersion: {}\nUptime:  {}s\nRules:   v{}\n",
        h.status, h.version, h.uptime_seconds, h.rules_version
    )
}

pub fn reset(s: &DailyResetSummary) -> String {
    format!(
        "Daily reset for {}: {} users, {} conversations ({:.2} per user), {} unblocked\n",
        s.date,
        s.total_users,
        s.total_conversations,
        s.average_conversations_per_user,
        s.blocked_users
    )
}
