//! Version information, single source of truth.

use serde::{Deserialize, Serialize};

/// Crate version from Cargo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git SHA captured at build time
pub const GIT_SHA: &str = env!("WENWEN_GIT_SHA");

/// UTC build date (YYYY-MM-DD)
pub const BUILD_DATE: &str = env!("WENWEN_BUILD_DATE");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_sha: String,
    pub build_date: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            git_sha: GIT_SHA.to_string(),
            build_date: BUILD_DATE.to_string(),
        }
    }

    /// Signature line appended to every reply, e.g. "高文文 v0.4.2"
    pub fn signature(&self) -> String {
        format!("{} v{}", crate::BOT_NAME, self.version)
    }
}
