use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::GameServiceFeature;
use crate::error::{GameServiceError, Result};

/// Which backend `create_client` builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    None,
    Mock,
    Local,
    WebStats,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Mock => "mock",
            BackendKind::Local => "local",
            BackendKind::WebStats => "web_stats",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = GameServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "none" | "" => Ok(BackendKind::None),
            "mock" => Ok(BackendKind::Mock),
            "local" | "sqlite" => Ok(BackendKind::Local),
            "web_stats" | "webstats" => Ok(BackendKind::WebStats),
            other => Err(GameServiceError::Config(format!("Unknown backend: {}", other))),
        }
    }
}

/// Direction in which the local backend ranks scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

/// Top-level configuration
///
/// Every field has a default, so an empty YAML document is valid:
/// ```yaml
/// backend: local
/// player_name: Alice
/// local:
///   db_path: saves.db
///   score_order: lower_is_better
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServiceConfig {
    pub backend: BackendKind,

    /// Display name used by backends without their own accounts
    pub player_name: String,

    /// Player id used by backends without their own accounts
    pub player_id: String,

    /// tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,

    pub mock: MockConfig,
    pub local: LocalConfig,
    pub web_stats: WebStatsConfig,
}

impl Default for GameServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::None,
            player_name: "Player".to_string(),
            player_id: "local-player".to_string(),
            log_filter: "game_services=info".to_string(),
            mock: MockConfig::default(),
            local: LocalConfig::default(),
            web_stats: WebStatsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Simulated backend round trip
    pub latency_ms: u64,
    pub fail_login: bool,
    pub unsupported_features: Vec<GameServiceFeature>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 200,
            fail_login: false,
            unsupported_features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub db_path: String,
    pub score_order: ScoreOrder,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            db_path: "game_services.db".to_string(),
            score_order: ScoreOrder::HigherIsBetter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebStatsConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for WebStatsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl GameServiceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_yaml_str(&yaml)
    }

    /// Override fields from `GAMESVCS_*` environment variables
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(backend) = lookup("GAMESVCS_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(db_path) = lookup("GAMESVCS_DB_PATH") {
            self.local.db_path = db_path;
        }
        if let Some(url) = lookup("GAMESVCS_STATS_URL") {
            self.web_stats.base_url = url;
        }
        if let Some(player) = lookup("GAMESVCS_PLAYER") {
            self.player_name = player;
        }
        Ok(self)
    }
}
