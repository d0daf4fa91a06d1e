//! Intent classifier driven by the declarative rule table.
//!
//! Every rule is evaluated against the normalised message. Hits are ranked
//! by rule priority, then keyword hit count, then table order, so the
//! special intents (brand, statistics, self-intro, directions,
//! confirmation) are never swallowed by a broad category keyword.

use crate::error::{Result, WenwenError};
use crate::helpers::{char_len, matched_keywords, normalize, strip_for_exact};
use crate::intent::{Intent, MedicalKind};
use crate::rules::{IntentRule, MatchMode, MedicalRule, RuleTable};
use crate::DEFAULT_MAX_MESSAGE_CHARS;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Confidence when no rule matched
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Added per keyword hit beyond the first
const CONFIDENCE_STEP: f32 = 0.05;

/// Upper bound for keyword-derived confidence
const CONFIDENCE_CAP: f32 = 0.99;

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub matched_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_kind: Option<MedicalKind>,
    /// Any-of tag filter for the retriever
    #[serde(default)]
    pub tag_terms: Vec<String>,
    /// Runner-up category when the message mixes unrelated categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixed_with: Option<Box<Classification>>,
    /// Message asks for every partner store
    #[serde(default)]
    pub all_partners: bool,
    /// First-ask reply cap from the winning rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_limit: Option<usize>,
    /// Name of the winning rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Classification {
    fn fallback() -> Self {
        Self {
            intent: Intent::General,
            confidence: FALLBACK_CONFIDENCE,
            matched_keywords: Vec::new(),
            medical_kind: None,
            tag_terms: Vec::new(),
            mixed_with: None,
            all_partners: false,
            suggested_limit: None,
            rule: None,
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.mixed_with.is_some()
    }
}

/// A rule that matched, with what it matched
struct RuleHit<'a> {
    index: usize,
    rule: &'a IntentRule,
    keywords: Vec<String>,
    tag_keywords: Vec<String>,
    medical: Option<&'a MedicalRule>,
}

impl RuleHit<'_> {
    fn hits(&self) -> usize {
        self.keywords.len() + self.tag_keywords.len()
    }
}

/// Keyword-rule intent classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    table: RuleTable,
    max_chars: usize,
}

impl IntentClassifier {
    pub fn new(table: RuleTable) -> Self {
        Self {
            table,
            max_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    /// Classifier over the compiled-in rule table
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(RuleTable::builtin()?))
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Reject empty and oversized messages
    pub fn validate(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(WenwenError::Validation("message is empty".to_string()));
        }
        let len = char_len(message);
        if len > self.max_chars {
            return Err(WenwenError::Validation(format!(
                "message has {} characters, limit is {}",
                len, self.max_chars
            )));
        }
        Ok(())
    }

    /// Classify a message. Pure: the same input always yields the same output.
    pub fn classify(&self, message: &str) -> Result<Classification> {
        self.validate(message)?;
        Ok(self.classify_text(message))
    }

    fn classify_text(&self, message: &str) -> Classification {
        let text = normalize(message);
        let exact = strip_for_exact(message);

        let mut hits: Vec<RuleHit> = self
            .table
            .rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| self.evaluate(index, rule, &text, &exact))
            .collect();
        hits.sort_by_key(|h| (Reverse(h.rule.priority), Reverse(h.hits()), h.index));

        let partner_keywords: Vec<String> = matched_keywords(&text, &self.table.partners.keywords)
            .into_iter()
            .map(str::to_string)
            .collect();
        let wants_partners = !partner_keywords.is_empty();

        let Some(winner) = hits.first() else {
            if wants_partners {
                return Classification {
                    confidence: round2(self.table.partners.confidence),
                    matched_keywords: partner_keywords,
                    all_partners: true,
                    ..Classification::fallback()
                };
            }
            return Classification::fallback();
        };

        let mut classification = build(winner);

        if winner.rule.intent.is_category_intent() {
            classification.mixed_with = hits
                .iter()
                .skip(1)
                .find(|other| is_unrelated_category(winner.rule, other.rule))
                .map(|other| Box::new(build(other)));
        }

        if wants_partners && winner.rule.intent.accepts_partner_listing() {
            classification.all_partners = true;
            classification.matched_keywords.extend(partner_keywords);
        }

        classification
    }

    fn evaluate<'a>(
        &'a self,
        index: usize,
        rule: &'a IntentRule,
        text: &str,
        exact: &str,
    ) -> Option<RuleHit<'a>> {
        let mut hit = RuleHit {
            index,
            rule,
            keywords: Vec::new(),
            tag_keywords: Vec::new(),
            medical: None,
        };

        match rule.match_mode {
            MatchMode::Exact => {
                if let Some(kw) = rule.keywords.iter().find(|kw| !kw.is_empty() && *kw == exact) {
                    hit.keywords.push(kw.clone());
                }
            }
            MatchMode::Contains => {
                hit.keywords = to_owned(matched_keywords(text, &rule.keywords));
                hit.tag_keywords = to_owned(matched_keywords(text, &rule.tag_keywords));

                if rule.intent == Intent::Medical {
                    if let Some((medical, keywords)) = self.best_medical(text) {
                        hit.medical = Some(medical);
                        for kw in keywords {
                            if !hit.keywords.contains(&kw) {
                                hit.keywords.push(kw);
                            }
                        }
                    }
                }
            }
        }

        (hit.hits() > 0).then_some(hit)
    }

    /// Medical sub-type with the most keyword hits; ties go to table order
    fn best_medical(&self, text: &str) -> Option<(&MedicalRule, Vec<String>)> {
        let mut best: Option<(&MedicalRule, Vec<String>)> = None;
        for medical in &self.table.medical {
            let found = to_owned(matched_keywords(text, &medical.keywords));
            if found.is_empty() {
                continue;
            }
            let better = best
                .as_ref()
                .map(|(_, current)| found.len() > current.len())
                .unwrap_or(true);
            if better {
                best = Some((medical, found));
            }
        }
        best
    }
}

fn build(hit: &RuleHit) -> Classification {
    let rule = hit.rule;
    let extra_hits = hit.hits().saturating_sub(1) as f32;
    let confidence = (rule.confidence + CONFIDENCE_STEP * extra_hits).min(CONFIDENCE_CAP);

    let mut tag_terms: Vec<String> = Vec::new();
    let medical_tags = hit.medical.map(|m| m.tags.as_slice()).unwrap_or(&[]);
    for term in rule
        .required_tags
        .iter()
        .chain(hit.tag_keywords.iter())
        .chain(medical_tags.iter())
    {
        if !tag_terms.contains(term) {
            tag_terms.push(term.clone());
        }
    }

    Classification {
        intent: rule.intent,
        confidence: round2(confidence),
        matched_keywords: hit
            .keywords
            .iter()
            .chain(hit.tag_keywords.iter())
            .cloned()
            .collect(),
        medical_kind: hit.medical.map(|m| m.kind),
        tag_terms,
        mixed_with: None,
        all_partners: false,
        suggested_limit: rule.default_limit,
        rule: Some(rule.name.clone()),
    }
}

/// Another category rule for a different intent, not declared related
fn is_unrelated_category(winner: &IntentRule, other: &IntentRule) -> bool {
    other.intent.is_category_intent()
        && other.intent != winner.intent
        && !winner.related.contains(&other.intent)
        && !other.related.contains(&winner.intent)
}

fn to_owned(keywords: Vec<&str>) -> Vec<String> {
    keywords.into_iter().map(str::to_string).collect()
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
