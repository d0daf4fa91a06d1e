//! Store records and the typed `features` blob.
//!
//! The `features` column is free-form JSON in storage. It is parsed here,
//! once, into [`StoreFeatures`]; nothing downstream touches raw JSON.

use crate::error::{Result, WenwenError};
use crate::helpers::normalize;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Review state of a store record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Approval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Pending => "pending",
            Approval::Approved => "approved",
            Approval::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Approval {
    type Err = WenwenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Approval::Pending),
            "approved" => Ok(Approval::Approved),
            "rejected" => Ok(Approval::Rejected),
            other => Err(WenwenError::Validation(format!(
                "unknown approval state '{}'",
                other
            ))),
        }
    }
}

/// Structured view of the `features` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreFeatures {
    /// Search tags ("藥局", "英語", "火鍋", ...)
    #[serde(default, deserialize_with = "tags_from_list_or_string")]
    pub tags: Vec<String>,

    /// Secondary classification, matched like a category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_category: Option<String>,

    /// Anything else the admin UI stored; kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Tags arrive either as a JSON array or as one comma-separated string.
fn tags_from_list_or_string<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        List(Vec<String>),
        Joined(String),
        Null,
    }

    let raw = Option::<RawTags>::deserialize(deserializer)?.unwrap_or(RawTags::Null);
    let tags = match raw {
        RawTags::List(list) => list,
        RawTags::Joined(joined) => joined
            .split([',', '，', '、'])
            .map(str::to_string)
            .collect(),
        RawTags::Null => Vec::new(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

impl StoreFeatures {
    /// Parse the raw column value. Empty and `null` mean no features.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return Ok(Self::default());
        }
        let mut features: StoreFeatures = serde_json::from_str(raw)?;
        features.secondary_category = features
            .secondary_category
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(features)
    }

    /// Serialize back to the column format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A business in the district catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_hours: Option<String>,
    #[serde(default)]
    pub features: StoreFeatures,
    #[serde(default)]
    pub is_trusted: bool,
    #[serde(default)]
    pub has_discount: bool,
    #[serde(default)]
    pub is_partner: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub approval: Approval,
}

impl Store {
    pub fn is_approved(&self) -> bool {
        self.approval == Approval::Approved
    }

    /// The category through which this store serves one of `categories`.
    /// The primary category wins over the secondary one.
    pub fn matched_category(&self, categories: &[&str]) -> Option<&str> {
        if categories.contains(&self.category.as_str()) {
            return Some(self.category.as_str());
        }
        self.features
            .secondary_category
            .as_deref()
            .filter(|secondary| categories.contains(secondary))
    }

    /// Fields tag filters are matched against
    fn tag_haystack(&self) -> impl Iterator<Item = &str> {
        self.features
            .tags
            .iter()
            .map(String::as_str)
            .chain(self.features.secondary_category.as_deref())
            .chain(self.subcategory.as_deref())
    }

    /// Terms that are substrings of a tag, the secondary category or the
    /// subcategory. Plain containment only.
    pub fn matched_tags(&self, terms: &[String]) -> Vec<String> {
        let haystack: Vec<String> = self.tag_haystack().map(normalize).collect();
        terms
            .iter()
            .filter(|term| {
                let term = normalize(term);
                !term.is_empty() && haystack.iter().any(|field| field.contains(&term))
            })
            .cloned()
            .collect()
    }

    /// Name contains the (normalised) brand keyword
    pub fn name_contains(&self, keyword: &str) -> bool {
        let keyword = normalize(keyword);
        !keyword.is_empty() && normalize(&self.name).contains(&keyword)
    }
}

/// Aggregate counts over approved stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub total_stores: u64,
    pub trusted_stores: u64,
    pub discount_stores: u64,
    pub partner_stores: u64,
    pub category_count: u64,
}

impl CoverageStats {
    pub fn from_stores(stores: &[Store]) -> Self {
        let approved: Vec<&Store> = stores.iter().filter(|s| s.is_approved()).collect();
        let categories: BTreeSet<&str> = approved.iter().map(|s| s.category.as_str()).collect();

        Self {
            total_stores: approved.len() as u64,
            trusted_stores: approved.iter().filter(|s| s.is_trusted).count() as u64,
            discount_stores: approved.iter().filter(|s| s.has_discount).count() as u64,
            partner_stores: approved.iter().filter(|s| s.is_partner).count() as u64,
            category_count: categories.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str, category: &str, tags: &[&str]) -> Store {
        Store {
            id: 1,
            name: name.to_string(),
            category: category.to_string(),
            subcategory: None,
            address: None,
            phone: None,
            business_hours: None,
            features: StoreFeatures {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
            is_trusted: false,
            has_discount: false,
            is_partner: false,
            rating: 0.0,
            approval: Approval::Approved,
        }
    }

    #[test]
    fn test_parse_features_array() {
        let f = StoreFeatures::parse(
            r#"{"tags":["英語"," 美語 ",""],"secondary_category":"補習班","menu_url":"x"}"#,
        )
        .unwrap();
        assert_eq!(f.tags, vec!["英語", "美語"]);
        assert_eq!(f.secondary_category.as_deref(), Some("補習班"));
        assert_eq!(f.extra.get("menu_url"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_parse_features_joined_tags() {
        let f = StoreFeatures::parse(r#"{"tags":"火鍋，日式,燒烤"}"#).unwrap();
        assert_eq!(f.tags, vec!["火鍋", "日式", "燒烤"]);
    }

    #[test]
    fn test_parse_features_empty_and_invalid() {
        assert_eq!(StoreFeatures::parse("").unwrap(), StoreFeatures::default());
        assert_eq!(StoreFeatures::parse("null").unwrap(), StoreFeatures::default());
        assert!(StoreFeatures::parse("{not json").is_err());
        assert!(StoreFeatures::parse(r#"{"tags": 5}"#).is_err());
    }

    #[test]
    fn test_matched_tags_is_substring_only() {
        let s = store("康健藥局", "醫療保健", &["社區藥局", "健保"]);
        let terms = vec!["藥局".to_string(), "牙醫".to_string()];
        assert_eq!(s.matched_tags(&terms), vec!["藥局"]);
    }

    #[test]
    fn test_secondary_category_counts_as_category() {
        let mut s = store("文山咖啡", "餐飲美食", &[]);
        s.features.secondary_category = Some("休閒娛樂".to_string());
        assert_eq!(s.matched_category(&["休閒娛樂"]), Some("休閒娛樂"));
        assert_eq!(s.matched_category(&["休閒娛樂", "餐飲美食"]), Some("餐飲美食"));
        assert_eq!(s.matched_category(&["購物"]), None);
    }

    #[test]
    fn test_coverage_ignores_unapproved() {
        let mut a = store("A", "餐飲美食", &[]);
        a.is_partner = true;
        let mut b = store("B", "購物", &[]);
        b.is_trusted = true;
        let mut c = store("C", "購物", &[]);
        c.approval = Approval::Pending;
        c.has_discount = true;

        let stats = CoverageStats::from_stores(&[a, b, c]);
        assert_eq!(stats.total_stores, 2);
        assert_eq!(stats.partner_stores, 1);
        assert_eq!(stats.trusted_stores, 1);
        assert_eq!(stats.discount_stores, 0);
        assert_eq!(stats.category_count, 2);
    }
}
