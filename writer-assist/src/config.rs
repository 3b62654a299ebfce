//! Tunable constants for the assist core.
//!
//! Layers, lowest first: the built-in example catalog compiled into the
//! crate, an optional TOML file, then `WRITER_ASSIST_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/writer-assist.toml";
pub const CONFIG_PATH_ENV: &str = "WRITER_ASSIST_CONFIG";
const BUILTIN_CONFIG_TOML: &str = include_str!("../config/writer-assist.example.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 15_000,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub popover_offset: f64,
    pub viewport_margin: f64,
    pub version_limit: usize,
    pub notice_ttl_ms: u64,
    pub batch_step_delay_ms: u64,
    pub max_diff_cells: usize,
    pub snapshot_limit: usize,
    pub fallback_enabled: bool,
    pub service: ServiceConfig,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            popover_offset: 8.0,
            viewport_margin: 10.0,
            version_limit: 5,
            notice_ttl_ms: 3_000,
            batch_step_delay_ms: 200,
            max_diff_cells: 4_000_000,
            snapshot_limit: 10,
            fallback_enabled: true,
            service: ServiceConfig::default(),
        }
    }
}

impl AssistConfig {
    /// Resolve the effective configuration. Never fails: each broken layer is
    /// logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::from_toml_str(BUILTIN_CONFIG_TOML).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Built-in config parse failed; using compiled defaults");
            Self::default()
        });

        if let Some(path) = config_path() {
            match Self::from_path(&path) {
                Ok(file_config) => {
                    tracing::info!(path = %path.display(), "Loaded writer-assist config");
                    config = file_config;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                }
            }
        }

        config.apply_env_overrides();
        config
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_POPOVER_OFFSET") {
            self.popover_offset = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_VIEWPORT_MARGIN") {
            self.viewport_margin = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_VERSION_LIMIT") {
            self.version_limit = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_NOTICE_TTL_MS") {
            self.notice_ttl_ms = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_BATCH_STEP_DELAY_MS") {
            self.batch_step_delay_ms = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_MAX_DIFF_CELLS") {
            self.max_diff_cells = v;
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_SNAPSHOT_LIMIT") {
            self.snapshot_limit = v;
        }
        if let Some(v) = lookup("WRITER_ASSIST_FALLBACK_ENABLED") {
            self.fallback_enabled = v != "0" && v.to_lowercase() != "false";
        }
        if let Some(url) = lookup("WRITER_ASSIST_SERVICE_URL").filter(|v| !v.trim().is_empty()) {
            self.service.base_url = Some(url.trim().to_string());
        }
        if let Some(v) = override_value(&lookup, "WRITER_ASSIST_SERVICE_TIMEOUT_MS") {
            self.service.timeout_ms = v;
        }

        // A zero cap would silently drop every generated version.
        self.version_limit = self.version_limit.max(1);
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    pub fn batch_step_delay(&self) -> Duration {
        Duration::from_millis(self.batch_step_delay_ms)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    default.exists().then_some(default)
}

fn override_value<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %trimmed, "Ignoring unparseable config override");
            None
        }
    }
}
