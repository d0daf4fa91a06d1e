//! Configuration management for wenwend.
//!
//! Loads settings from `$WENWEN_CONFIG`, then /etc/wenwen/config.toml, or
//! uses defaults. Every field has a default so a partial file is valid.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use wenwen_shared::error::{Result, WenwenError};
use wenwen_shared::rules::RuleTable;
use wenwen_shared::{IntentClassifier, ResponseRenderer, VersionInfo};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/wenwen/config.toml";

/// Environment variable that overrides [`CONFIG_PATH`]
pub const CONFIG_ENV: &str = "WENWEN_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/wenwen/wenwen.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Chat pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longest accepted message, in characters
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Cap on stores listed in one reply
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// User messages per local day before the profile is blocked
    #[serde(default = "default_daily_message_limit")]
    pub daily_message_limit: u64,

    /// Override for the reply footer (defaults to "高文文 v<version>")
    #[serde(default)]
    pub signature: Option<String>,
}

fn default_max_message_chars() -> usize {
    wenwen_shared::DEFAULT_MAX_MESSAGE_CHARS
}

fn default_max_recommendations() -> usize {
    wenwen_shared::DEFAULT_RECOMMENDATION_LIMIT
}

fn default_daily_message_limit() -> u64 {
    50
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            max_recommendations: default_max_recommendations(),
            daily_message_limit: default_daily_message_limit(),
            signature: None,
        }
    }
}

/// Store catalogue cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    16
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Daily reset job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Run the reset on a timer inside the daemon
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,

    /// Local hour (0-23) the reset runs at
    #[serde(default)]
    pub reset_hour: u32,

    /// Local time zone as a fixed offset; Asia/Taipei is +8
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_clarification_retention")]
    pub clarification_retention_hours: i64,

    #[serde(default = "default_conversation_retention")]
    pub conversation_retention_days: i64,
}

fn default_true() -> bool {
    true
}

fn default_utc_offset() -> i32 {
    8
}

fn default_clarification_retention() -> i64 {
    24
}

fn default_conversation_retention() -> i64 {
    30
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            reset_hour: 0,
            utc_offset_hours: default_utc_offset(),
            clarification_retention_hours: default_clarification_retention(),
            conversation_retention_days: default_conversation_retention(),
        }
    }
}

impl JobsConfig {
    /// Local offset. Validated configs are always in range.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
}

fn default_session_hours() -> i64 {
    12
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            session_hours: default_session_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Intent rule table to use instead of the built-in one
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub rules: RulesConfig,
}

impl Config {
    /// Load from `$WENWEN_CONFIG` or [`CONFIG_PATH`]. A missing file means
    /// defaults; a file that does not parse is an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_PATH));

        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Self::load_from_path(&path)
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WenwenError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| WenwenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chat.max_message_chars == 0 {
            return Err(WenwenError::Config(
                "chat.max_message_chars must be positive".to_string(),
            ));
        }
        if self.chat.max_recommendations == 0 {
            return Err(WenwenError::Config(
                "chat.max_recommendations must be positive".to_string(),
            ));
        }
        if self.jobs.reset_hour > 23 {
            return Err(WenwenError::Config(format!(
                "jobs.reset_hour {} is not an hour of the day",
                self.jobs.reset_hour
            )));
        }
        if !(-12..=14).contains(&self.jobs.utc_offset_hours) {
            return Err(WenwenError::Config(format!(
                "jobs.utc_offset_hours {} is out of range",
                self.jobs.utc_offset_hours
            )));
        }
        if self.cache.capacity == 0 {
            return Err(WenwenError::Config("cache.capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Classifier over the configured rule table
    pub fn classifier(&self) -> Result<IntentClassifier> {
        let table = match &self.rules.path {
            Some(path) => {
                info!("Loading intent rules from {}", path.display());
                RuleTable::load(path)?
            }
            None => RuleTable::builtin()?,
        };
        Ok(IntentClassifier::new(table).with_max_chars(self.chat.max_message_chars))
    }

    pub fn renderer(&self) -> ResponseRenderer {
        match &self.chat.signature {
            Some(signature) => ResponseRenderer::with_signature(signature.clone()),
            None => ResponseRenderer::new(&VersionInfo::current()),
        }
    }
}
