//! Prometheus metrics for the chat service

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, IntCounter, IntCounterVec, Registry,
    TextEncoder,
};
use wenwen_shared::api::ReplySource;
use wenwen_shared::Intent;

#[derive(Clone)]
pub struct ChatMetrics {
    pub chat_requests_total: IntCounterVec,
    pub replies_total: IntCounterVec,
    pub not_found_total: IntCounter,
    pub blocked_total: IntCounter,
    pub persistence_failures_total: IntCounter,
    pub processing_seconds: Histogram,
    registry: Registry,
}

impl ChatMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let chat_requests_total = register_int_counter_vec_with_registry!(
            "wenwen_chat_requests_total",
            "Chat turns by classified intent",
            &["intent"],
            registry
        )?;

        let replies_total = register_int_counter_vec_with_registry!(
            "wenwen_replies_total",
            "Replies by source (recommendation, faq, template, ...)",
            &["source"],
            registry
        )?;

        let not_found_total = register_int_counter_with_registry!(
            "wenwen_not_found_total",
            "Store requests answered with an honest not-found reply",
            registry
        )?;

        let blocked_total = register_int_counter_with_registry!(
            "wenwen_daily_limit_total",
            "Messages refused because the daily limit was reached",
            registry
        )?;

        let persistence_failures_total = register_int_counter_with_registry!(
            "wenwen_persistence_failures_total",
            "Chat turns that could not be written to the database",
            registry
        )?;

        let processing_seconds = register_histogram_with_registry!(
            "wenwen_chat_processing_seconds",
            "Time to build a chat reply",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            registry
        )?;

        Ok(Self {
            chat_requests_total,
            replies_total,
            not_found_total,
            blocked_total,
            persistence_failures_total,
            processing_seconds,
            registry,
        })
    }

    /// Record a finished chat turn
    pub fn record_reply(&self, intent: Intent, source: ReplySource, elapsed_secs: f64) {
        self.chat_requests_total
            .with_label_values(&[intent.as_str()])
            .inc();
        self.replies_total
            .with_label_values(&[source_label(source)])
            .inc();
        match source {
            ReplySource::NotFound => self.not_found_total.inc(),
            ReplySource::DailyLimit => self.blocked_total.inc(),
            _ => {}
        }
        self.processing_seconds.observe(elapsed_secs);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures_total.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn source_label(source: ReplySource) -> &'static str {
    match source {
        ReplySource::Recommendation => "recommendation",
        ReplySource::NotFound => "not_found",
        ReplySource::Mixed => "mixed",
        ReplySource::CoverageStats => "coverage_stats",
        ReplySource::Faq => "faq",
        ReplySource::Template => "template",
        ReplySource::DailyLimit => "daily_limit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_export() {
        let metrics = ChatMetrics::new().unwrap();
        metrics.record_reply(Intent::Medical, ReplySource::NotFound, 0.002);
        metrics.record_reply(Intent::Food, ReplySource::Recommendation, 0.001);

        assert_eq!(metrics.not_found_total.get(), 1);
        assert_eq!(
            metrics.chat_requests_total.with_label_values(&["MEDICAL"]).get(),
            1
        );

        let text = metrics.export().unwrap();
        assert!(text.contains("wenwen_chat_requests_total"));
        assert!(text.contains("wenwen_not_found_total 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ChatMetrics::new().unwrap();
        let b = ChatMetrics::new().unwrap();
        a.record_persistence_failure();
        assert_eq!(b.persistence_failures_total.get(), 0);
    }
}
