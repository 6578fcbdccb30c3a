//! Layered configuration for the gate
//!
//! Configuration is JSON, loaded from several files by [`ConfigLoader`] and
//! merged with later files taking precedence. Environment variables are
//! applied last.

pub mod duration;
pub mod loader;
pub mod pattern;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use duration::{format_duration, parse_duration};
pub use loader::{ConfigLoader, find_project_root};
pub use pattern::{GlobPattern, glob_match};

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid duration: {value}")]
    InvalidDuration { value: String },

    #[error("invalid file pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Concurrency settings for running linters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_parallel: Option<bool>,
}

/// Per-linter entry of the `linters` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinterSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Linter options applied to files matching a glob pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub pattern: String,
    /// Linter name, or `*` for every linter
    pub linter: String,
    #[serde(default)]
    pub rules: Map<String, Value>,
}

impl RuleOverride {
    pub fn applies_to_linter(&self, linter: &str) -> bool {
        self.linter == "*" || self.linter == linter
    }
}

/// Complete gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelConfig>,
    #[serde(
        default,
        with = "duration::serde_opt_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub linters: BTreeMap<String, LinterSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleOverride>,
}

impl GateConfig {
    /// Parses configuration from JSON text.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` tagged with `origin`.
    pub fn from_json(origin: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Layers `other` on top of this configuration.
    ///
    /// Fields set in `other` win, linter entries merge field by field and
    /// rules are appended.
    pub fn merge(&mut self, other: GateConfig) {
        if let Some(parallel) = other.parallel {
            let current = self.parallel.get_or_insert_with(ParallelConfig::default);
            if parallel.max_workers.is_some() {
                current.max_workers = parallel.max_workers;
            }
            if parallel.disable_parallel.is_some() {
                current.disable_parallel = parallel.disable_parallel;
            }
        }

        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }

        for tool in other.blocked_tools {
            if !self.blocked_tools.contains(&tool) {
                self.blocked_tools.push(tool);
            }
        }

        for (name, settings) in other.linters {
            let entry = self.linters.entry(name).or_default();
            if settings.enabled.is_some() {
                entry.enabled = settings.enabled;
            }
            if settings.config.is_some() {
                entry.config = settings.config;
            }
        }

        self.rules.extend(other.rules);
    }

    /// Linters are enabled unless explicitly disabled.
    pub fn is_linter_enabled(&self, name: &str) -> bool {
        self.linters
            .get(name)
            .and_then(|s| s.enabled)
            .unwrap_or(true)
    }

    pub fn linter_config(&self, name: &str) -> Option<&Value> {
        self.linters.get(name).and_then(|s| s.config.as_ref())
    }

    /// Rules matching `path` for `linter`, in configuration order.
    pub fn matching_rules(&self, path: &Path, linter: &str) -> Vec<&RuleOverride> {
        let base = std::env::current_dir().ok();
        self.rules
            .iter()
            .filter(|rule| rule.applies_to_linter(linter))
            .filter(|rule| glob_match(&rule.pattern, path, base.as_deref()))
            .collect()
    }

    /// Override objects of every matching rule, in order.
    pub fn rule_overrides(&self, path: &Path, linter: &str) -> Vec<&Map<String, Value>> {
        self.matching_rules(path, linter)
            .into_iter()
            .map(|rule| &rule.rules)
            .collect()
    }

    /// Worker count for the parallel executor; `0` means one per CPU.
    pub fn max_workers(&self) -> usize {
        match &self.parallel {
            Some(ParallelConfig {
                disable_parallel: Some(true),
                ..
            }) => 1,
            Some(ParallelConfig {
                max_workers: Some(n),
                ..
            }) => *n,
            _ => 0,
        }
    }

    /// Applies `LINTGATE_TIMEOUT` and `LINTGATE_MAX_WORKERS`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Ok(timeout) = std::env::var("LINTGATE_TIMEOUT") {
            match parse_duration(&timeout) {
                Ok(duration) => self.timeout = Some(duration),
                Err(e) => tracing::warn!("Ignoring LINTGATE_TIMEOUT: {e}"),
            }
        }

        if let Ok(max_workers) = std::env::var("LINTGATE_MAX_WORKERS") {
            match max_workers.parse::<usize>() {
                Ok(count) => {
                    self.parallel
                        .get_or_insert_with(ParallelConfig::default)
                        .max_workers = Some(count);
                }
                Err(_) => tracing::warn!(value = %max_workers, "Ignoring LINTGATE_MAX_WORKERS"),
            }
        }
    }
}
