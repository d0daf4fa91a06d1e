//! Store retrieval under the allowlist policy.
//!
//! Candidates come only from the snapshot passed in. Matching is category
//! equality plus substring containment on tags; nothing fuzzy, so every
//! recommendation can be explained by `matched_tags` and `evidence_level`.
//!
//! # Ranking
//!
//! 1. one boosted partner per category (every partner on all-partner asks)
//! 2. `rating` descending
//! 3. matched tag count descending
//! 4. name, for a stable order

use crate::classifier::Classification;
use crate::intent::Intent;
use crate::store::Store;
use crate::DEFAULT_RECOMMENDATION_LIMIT;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// How a recommendation was justified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    /// Category matched and at least one tag filter matched
    TagMatch,
    /// Category matched, no tag filter in play
    CategoryMatch,
    /// Store name contains the requested brand
    NameMatch,
    /// Listed because every partner was requested
    PartnerListing,
}

/// Why a result is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The intent lists stores but nothing in the catalogue matched
    NotFound,
    /// The intent never lists stores (statistics, small talk, ...)
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedStore {
    pub store: Store,
    pub matched_tags: Vec<String>,
    pub evidence_level: EvidenceLevel,
    /// Moved to the front by the partner rule
    pub boosted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub items: Vec<RecommendedStore>,
    /// Matches before the cap was applied
    pub candidate_count: usize,
    /// Cap that was applied (usize::MAX when uncapped)
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

impl RecommendationResult {
    fn empty(reason: EmptyReason, limit: usize) -> Self {
        Self {
            items: Vec::new(),
            candidate_count: 0,
            limit,
            empty_reason: Some(reason),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_not_found(&self) -> bool {
        self.empty_reason == Some(EmptyReason::NotFound)
    }

    pub fn stores(&self) -> impl Iterator<Item = &Store> {
        self.items.iter().map(|item| &item.store)
    }

    pub fn partner_boosted(&self) -> bool {
        self.items.iter().any(|item| item.boosted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOptions {
    /// Global cap on listed stores
    pub limit: usize,
    /// Same intent asked again in this session; ignore the rule's first-ask cap
    pub follow_up: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RECOMMENDATION_LIMIT,
            follow_up: false,
        }
    }
}

impl RetrievalOptions {
    fn effective_limit(&self, classification: &Classification) -> usize {
        match classification.suggested_limit {
            Some(first_ask) if !self.follow_up => first_ask.min(self.limit),
            _ => self.limit,
        }
    }
}

struct Candidate<'a> {
    store: &'a Store,
    /// Category the store was selected through; boost slots are keyed on it
    category: &'a str,
    matched_tags: Vec<String>,
    evidence_level: EvidenceLevel,
}

/// Select stores for a classification. Never returns a store that is not
/// in `stores`.
pub fn retrieve(
    classification: &Classification,
    stores: &[Store],
    options: &RetrievalOptions,
) -> RecommendationResult {
    let intent = classification.intent;

    if classification.all_partners && intent.accepts_partner_listing() {
        return list_partners(intent, stores);
    }

    let limit = options.effective_limit(classification);

    let candidates: Vec<Candidate> = match intent {
        Intent::BrandSpecific => brand_candidates(classification, stores),
        _ if intent.is_category_intent() => category_candidates(classification, stores),
        _ => return RecommendationResult::empty(EmptyReason::NotApplicable, limit),
    };

    if candidates.is_empty() {
        return RecommendationResult::empty(EmptyReason::NotFound, limit);
    }

    let candidate_count = candidates.len();
    let items = rank(candidates, false)
        .into_iter()
        .take(limit)
        .collect();

    RecommendationResult {
        items,
        candidate_count,
        limit,
        empty_reason: None,
    }
}

fn category_candidates<'a>(classification: &Classification, stores: &'a [Store]) -> Vec<Candidate<'a>> {
    let categories = classification.intent.categories();
    let tag_terms = &classification.tag_terms;

    stores
        .iter()
        .filter(|s| s.is_approved())
        .filter_map(|store| {
            let category = store.matched_category(categories)?;
            if tag_terms.is_empty() {
                return Some(Candidate {
                    store,
                    category,
                    matched_tags: Vec::new(),
                    evidence_level: EvidenceLevel::CategoryMatch,
                });
            }
            let matched_tags = store.matched_tags(tag_terms);
            (!matched_tags.is_empty()).then_some(Candidate {
                store,
                category,
                matched_tags,
                evidence_level: EvidenceLevel::TagMatch,
            })
        })
        .collect()
}

fn brand_candidates<'a>(classification: &Classification, stores: &'a [Store]) -> Vec<Candidate<'a>> {
    stores
        .iter()
        .filter(|s| s.is_approved())
        .filter_map(|store| {
            let brands: Vec<String> = classification
                .matched_keywords
                .iter()
                .filter(|kw| store.name_contains(kw))
                .cloned()
                .collect();
            (!brands.is_empty()).then_some(Candidate {
                store,
                category: store.category.as_str(),
                matched_tags: brands,
                evidence_level: EvidenceLevel::NameMatch,
            })
        })
        .collect()
}

/// Every approved partner, restricted to the intent's categories when it has any
fn list_partners(intent: Intent, stores: &[Store]) -> RecommendationResult {
    let categories = intent.categories();
    let candidates: Vec<Candidate> = stores
        .iter()
        .filter(|s| s.is_approved() && s.is_partner)
        .filter_map(|store| {
            let category = if categories.is_empty() {
                store.category.as_str()
            } else {
                store.matched_category(categories)?
            };
            Some(Candidate {
                store,
                category,
                matched_tags: Vec::new(),
                evidence_level: EvidenceLevel::PartnerListing,
            })
        })
        .collect();

    if candidates.is_empty() {
        return RecommendationResult::empty(EmptyReason::NotFound, usize::MAX);
    }

    let candidate_count = candidates.len();
    RecommendationResult {
        items: rank(candidates, true),
        candidate_count,
        limit: usize::MAX,
        empty_reason: None,
    }
}

fn compare_merit(a: &Candidate, b: &Candidate) -> Ordering {
    b.store
        .rating
        .partial_cmp(&a.store.rating)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.matched_tags.len().cmp(&a.matched_tags.len()))
        .then_with(|| a.store.name.cmp(&b.store.name))
        .then_with(|| a.store.id.cmp(&b.store.id))
}

/// Order by merit, then move boosted partners to the front
fn rank(mut candidates: Vec<Candidate>, boost_every_partner: bool) -> Vec<RecommendedStore> {
    candidates.sort_by(compare_merit);

    let mut boosted_categories: HashSet<&str> = HashSet::new();
    let mut boosted = Vec::new();
    let mut rest = Vec::new();

    for candidate in candidates {
        let boost = candidate.store.is_partner
            && (boost_every_partner || boosted_categories.insert(candidate.category));
        let item = RecommendedStore {
            store: candidate.store.clone(),
            matched_tags: candidate.matched_tags,
            evidence_level: candidate.evidence_level,
            boosted: boost,
        };
        if boost {
            boosted.push(item);
        } else {
            rest.push(item);
        }
    }

    boosted.extend(rest);
    boosted
}
