//! Back-office content: FAQs, quick questions, training examples.

use crate::intent::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frequently asked question with a canned answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    #[serde(default)]
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Suggested question shown as a tappable chip in the chat UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickQuestion {
    #[serde(default)]
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Labelled query used to check the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    #[serde(default)]
    pub id: i64,
    pub query: String,
    pub expected_intent: Intent,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}
