//! Switcher configuration and feature flags.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::errors::SwitcherError;
use crate::observability::LogFormat;

/// Feature keys the switcher consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    /// Allows the next-generation editor.
    V2Alpha,
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2Alpha => write!(f, "v2_alpha"),
        }
    }
}

/// Injected feature-flag capability.
pub trait FeatureFlags: Send + Sync {
    /// Returns true if the feature is on.
    fn is_enabled(&self, key: FeatureKey) -> bool;
}

/// Runtime-toggleable set of enabled features.
#[derive(Debug, Default)]
pub struct FeatureFlagSet {
    enabled: RwLock<HashSet<FeatureKey>>,
}

impl FeatureFlagSet {
    /// Creates a set with every feature off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set with the given features on.
    #[must_use]
    pub fn with_enabled(keys: impl IntoIterator<Item = FeatureKey>) -> Self {
        Self {
            enabled: RwLock::new(keys.into_iter().collect()),
        }
    }

    /// Turns a feature on.
    pub fn enable(&self, key: FeatureKey) {
        self.enabled.write().insert(key);
    }

    /// Turns a feature off.
    pub fn disable(&self, key: FeatureKey) {
        self.enabled.write().remove(&key);
    }
}

impl FeatureFlags for FeatureFlagSet {
    fn is_enabled(&self, key: FeatureKey) -> bool {
        self.enabled.read().contains(&key)
    }
}

/// Feature section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Features turned on at startup.
    #[serde(default)]
    pub enabled: Vec<FeatureKey>,
}

/// Configuration of the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the pipelines API server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_base_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_timeout() -> f64 {
    30.0
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            headers: HashMap::new(),
        }
    }
}

impl ApiConfig {
    /// Gets timeout as Duration.
    ///
    /// Negative values clamp to zero. Values too large for a `Duration`
    /// are rejected.
    pub fn timeout(&self) -> Result<Duration, SwitcherError> {
        Duration::try_from_secs_f64(self.timeout_seconds.max(0.0)).map_err(|e| {
            SwitcherError::Config(format!("invalid timeout_seconds {}: {e}", self.timeout_seconds))
        })
    }
}

/// Top-level switcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitcherConfig {
    /// Feature flags.
    #[serde(default)]
    pub features: FeatureConfig,
    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl SwitcherConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SwitcherError> {
        serde_json::from_str(json).map_err(|e| SwitcherError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SwitcherError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SwitcherError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Turns a feature on.
    #[must_use]
    pub fn with_feature(mut self, key: FeatureKey) -> Self {
        if !self.features.enabled.contains(&key) {
            self.features.enabled.push(key);
        }
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Builds the feature-flag set described by this configuration.
    #[must_use]
    pub fn feature_flags(&self) -> FeatureFlagSet {
        FeatureFlagSet::with_enabled(self.features.enabled.iter().copied())
    }
}
