//! Shared types and decision logic for 高文文.
//!
//! Everything here is pure: no database, no network. The daemon feeds
//! store snapshots in and gets classifications, recommendations and
//! rendered replies out.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod content;
pub mod error;
pub mod faq;
pub mod helpers;
pub mod intent;
pub mod renderer;
pub mod retriever;
pub mod rules;
pub mod store;
pub mod training;
pub mod version;

pub use classifier::{Classification, IntentClassifier};
pub use error::WenwenError;
pub use intent::{Intent, MedicalKind, CATEGORY_BY_INTENT};
pub use renderer::ResponseRenderer;
pub use retriever::{retrieve, RecommendationResult, RetrievalOptions};
pub use store::{Approval, CoverageStats, Store, StoreFeatures};
pub use version::{VersionInfo, BUILD_DATE, GIT_SHA, VERSION};

/// Default maximum message length in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1000;

/// Default cap on recommended stores per reply
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 3;

/// Name of the district the bot serves
pub const DISTRICT_NAME: &str = "文山特區";

/// Bot display name
pub const BOT_NAME: &str = "高文文";
