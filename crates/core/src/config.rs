//! Discovery configuration: strategy choice, kind->version overrides and prune exclusions.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const ENV_STRATEGY: &str = "SHIPYARD_DISCOVERY_STRATEGY";
pub const ENV_VERSION_OVERRIDES: &str = "SHIPYARD_VERSION_OVERRIDES";

/// Kinds served only under an older version than the newest one of their group.
const BUILTIN_VERSION_OVERRIDES: &[(&str, &str)] = &[
    ("CronJob", "v1beta1"),
    ("VolumeAttachment", "v1beta1"),
    ("CSIDriver", "v1beta1"),
    ("Ingress", "v1beta1"),
    ("CSINode", "v1beta1"),
    ("Job", "v1"),
    ("IngressClass", "v1beta1"),
    ("FrontendConfig", "v1beta1"),
    ("ServiceNetworkEndpointGroup", "v1beta1"),
];

pub const DEFAULT_EXCLUDED_KINDS: &[&str] = &["Namespace", "Node", "ControllerRevision"];
/// Pseudo-kinds that only show up in some servers' raw API paths.
pub const DEFAULT_EXTENDED_EXCLUSIONS: &[&str] = &["NodeProxyOptions"];

/// Which `ApiSurfaceFetcher` variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyChoice {
    /// Pick from the server version.
    #[default]
    Auto,
    PathIntrospection,
    TabularCommand,
}

impl StrategyChoice {
    /// Parse a value read from `key` (env var or flag name), which is named in the error.
    pub fn parse_from(s: &str, key: &'static str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "path" | "path-introspection" | "raw" => Ok(Self::PathIntrospection),
            "tabular" | "tabular-command" | "api-resources" => Ok(Self::TabularCommand),
            _ => Err(ConfigError::Invalid { key, value: s.to_string() }),
        }
    }
}

impl FromStr for StrategyChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_from(s, "strategy")
    }
}

/// `kind -> version` table forcing the version used for a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionOverrides(BTreeMap<String, String>);

impl Default for VersionOverrides {
    fn default() -> Self {
        Self(BUILTIN_VERSION_OVERRIDES.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

impl VersionOverrides {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0.get(kind).map(String::as_str)
    }

    pub fn insert(&mut self, kind: impl Into<String>, version: impl Into<String>) {
        self.0.insert(kind.into(), version.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a YAML (or JSON, which is YAML) mapping of kind to version.
    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse { path: origin.to_string(), source })
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
        Self::from_yaml_str(&raw, path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub strategy: StrategyChoice,
    pub version_overrides: VersionOverrides,
    pub excluded_kinds: Vec<String>,
    /// Applied on top of `excluded_kinds` when the path-introspection strategy is in use.
    pub extended_exclusions: Vec<String>,
    /// Retry budget handed to the command runner for discovery calls.
    pub attempts: u32,
    /// Upper bound on concurrent per-path requests.
    pub path_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::Auto,
            version_overrides: VersionOverrides::default(),
            excluded_kinds: DEFAULT_EXCLUDED_KINDS.iter().map(|s| s.to_string()).collect(),
            extended_exclusions: DEFAULT_EXTENDED_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            attempts: 5,
            path_concurrency: 8,
        }
    }
}

impl DiscoveryConfig {
    /// Defaults overlaid with `SHIPYARD_DISCOVERY_STRATEGY` and `SHIPYARD_VERSION_OVERRIDES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(s) = std::env::var(ENV_STRATEGY) {
            cfg.strategy = StrategyChoice::parse_from(&s, ENV_STRATEGY)?;
            debug!(strategy = ?cfg.strategy, "discovery strategy from env");
        }
        if let Ok(path) = std::env::var(ENV_VERSION_OVERRIDES) {
            cfg.version_overrides = VersionOverrides::from_path(&path)?;
            info!(path = %path, entries = cfg.version_overrides.len(), "loaded version overrides");
        }
        Ok(cfg)
    }

    pub fn is_excluded(&self, kind: &str, extended: bool) -> bool {
        self.excluded_kinds.iter().any(|k| k == kind) || (extended && self.extended_exclusions.iter().any(|k| k == kind))
    }
}
