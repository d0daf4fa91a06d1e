//! Declarative intent rule table.
//!
//! Rules are data: the default table is compiled in from
//! `rules/intent_rules.toml` and a deployment can point the daemon at its
//! own copy. Golden tests run against the same table the daemon loads.

use crate::error::{Result, WenwenError};
use crate::helpers::{normalize, strip_for_exact};
use crate::intent::{Intent, MedicalKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Built-in rule table
pub const DEFAULT_RULES_TOML: &str = include_str!("../rules/intent_rules.toml");

/// Priority of category (store-listing) rules
pub const CATEGORY_PRIORITY: u32 = 50;

/// How a rule compares its keywords with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Keyword appears anywhere in the message
    #[default]
    Contains,
    /// Whole message equals the keyword, ignoring punctuation and spaces
    Exact,
}

/// One keyword → intent rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub intent: Intent,
    pub priority: u32,
    pub confidence: f32,

    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,

    pub keywords: Vec<String>,

    /// Keywords that trigger the rule AND become tag filters
    #[serde(default)]
    pub tag_keywords: Vec<String>,

    /// Tag filter applied whenever this rule wins (any-of)
    #[serde(default)]
    pub required_tags: Vec<String>,

    /// Category intents that co-occur without being a mixed request
    #[serde(default)]
    pub related: Vec<Intent>,

    /// Reply cap on a first ask; follow-ups use the global cap
    #[serde(default)]
    pub default_limit: Option<usize>,
}

/// Medical sub-type keywords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRule {
    pub kind: MedicalKind,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
}

/// Phrases that ask for every partner store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerRule {
    pub keywords: Vec<String>,
    pub confidence: f32,
}

impl Default for PartnerRule {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            confidence: 0.9,
        }
    }
}

/// The whole table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    pub version: u32,
    pub rules: Vec<IntentRule>,
    #[serde(default)]
    pub medical: Vec<MedicalRule>,
    #[serde(default)]
    pub partners: PartnerRule,
}

impl RuleTable {
    /// Parse and validate a TOML rule table
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut table: RuleTable = toml::from_str(text)
            .map_err(|e| WenwenError::Config(format!("invalid rule table: {}", e)))?;
        table.normalize_keywords();
        table.validate()?;
        Ok(table)
    }

    /// The compiled-in table
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_RULES_TOML)
    }

    /// Load from a file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WenwenError::Config(format!("cannot read rule table {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Keywords are stored in the same normal form as messages
    fn normalize_keywords(&mut self) {
        for rule in &mut self.rules {
            let mode = rule.match_mode;
            let fold = |kw: &String| match mode {
                MatchMode::Contains => normalize(kw),
                MatchMode::Exact => strip_for_exact(kw),
            };
            rule.keywords = rule.keywords.iter().map(fold).collect();
            rule.tag_keywords = rule.tag_keywords.iter().map(fold).collect();
        }
        for medical in &mut self.medical {
            medical.keywords = medical.keywords.iter().map(|k| normalize(k)).collect();
        }
        self.partners.keywords = self.partners.keywords.iter().map(|k| normalize(k)).collect();
    }

    fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(WenwenError::Config("rule table has no rules".to_string()));
        }

        let mut names = HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name.as_str()) {
                return Err(WenwenError::Config(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            if rule.keywords.iter().chain(&rule.tag_keywords).all(|k| k.is_empty()) {
                return Err(WenwenError::Config(format!(
                    "rule '{}' has no keywords",
                    rule.name
                )));
            }
            if !(0.0..=1.0).contains(&rule.confidence) {
                return Err(WenwenError::Config(format!(
                    "rule '{}' confidence {} outside 0..=1",
                    rule.name, rule.confidence
                )));
            }
            if rule.intent == Intent::General {
                return Err(WenwenError::Config(format!(
                    "rule '{}' targets GENERAL, which is the no-match fallback",
                    rule.name
                )));
            }
            if rule.priority == CATEGORY_PRIORITY && !rule.intent.is_category_intent() {
                return Err(WenwenError::Config(format!(
                    "rule '{}' uses category priority for non-category intent {}",
                    rule.name, rule.intent
                )));
            }
            if rule.default_limit == Some(0) {
                return Err(WenwenError::Config(format!(
                    "rule '{}' has default_limit 0",
                    rule.name
                )));
            }
        }

        if !self.medical.is_empty() && !self.rules.iter().any(|r| r.intent == Intent::Medical) {
            return Err(WenwenError::Config(
                "medical sub-types defined without a MEDICAL rule".to_string(),
            ));
        }
        for medical in &self.medical {
            if medical.keywords.is_empty() || medical.tags.is_empty() {
                return Err(WenwenError::Config(format!(
                    "medical sub-type {} needs keywords and tags",
                    medical.kind
                )));
            }
        }

        Ok(())
    }

    /// First rule for an intent, in table order
    pub fn rule_for(&self, intent: Intent) -> Option<&IntentRule> {
        self.rules.iter().find(|r| r.intent == intent)
    }
}
