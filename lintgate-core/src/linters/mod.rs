//! Language linters and the shared result model
//!
//! Each [`Linter`] checks one family of files. Linters are configured once
//! from the loaded configuration and may receive per-file [`LintOverrides`]
//! that are layered on top of that base without mutating it.

pub mod batch;
mod brackets;
pub mod golang;
pub mod javascript;
pub mod json;
pub mod markdown;
pub mod parallel;
pub mod process;
pub mod protobuf;
pub mod python;
pub mod rust;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use batch::BatchExecutor;
pub use golang::GoLinter;
pub use javascript::JavaScriptLinter;
pub use json::JsonLinter;
pub use markdown::MarkdownLinter;
pub use parallel::{LintTaskResult, LinterFailure, ParallelExecutor, aggregate_results};
pub use process::{ToolLocator, ToolOutput, run_tool};
pub use protobuf::ProtobufLinter;
pub use python::PythonLinter;
pub use rust::RustLinter;

/// How serious a finding is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single finding reported by a linter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub message: String,
    pub rule: String,
}

impl Issue {
    pub fn new(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        severity: Severity,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            severity,
            message: message.into(),
            rule: rule.into(),
        }
    }

    pub fn error(
        file: &Path,
        line: usize,
        column: usize,
        message: impl Into<String>,
        rule: &str,
    ) -> Self {
        Self::new(file, line, column, Severity::Error, message, rule)
    }

    pub fn warning(
        file: &Path,
        line: usize,
        column: usize,
        message: impl Into<String>,
        rule: &str,
    ) -> Self {
        Self::new(file, line, column, Severity::Warning, message, rule)
    }
}

/// Outcome of linting one file (or, after aggregation, several linters).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LintReport {
    pub success: bool,
    pub issues: Vec<Issue>,
    /// Formatter output when it differs from the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_output: Option<String>,
}

impl LintReport {
    pub fn clean() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Builds a report whose success flag follows the issue severities.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let mut report = Self {
            issues,
            ..Self::default()
        };
        report.refresh_success();
        report
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
        self.refresh_success();
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
        self.refresh_success();
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    fn refresh_success(&mut self) {
        self.success = !self.issues.iter().any(|i| i.severity == Severity::Error);
    }
}

/// Errors raised by linters themselves, as opposed to findings.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("invalid {linter} configuration: {reason}")]
    InvalidConfig { linter: String, reason: String },

    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-file configuration overrides as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintOverrides {
    values: Map<String, Value>,
}

impl LintOverrides {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Layers `other` on top of these overrides; later keys win.
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Overlays the override keys on `base` and decodes the result.
    ///
    /// # Errors
    /// Returns `LintError::InvalidConfig` when the merged object no longer
    /// decodes as `T`.
    pub fn resolve<T>(&self, linter: &str, base: &T) -> Result<T, LintError>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        if self.values.is_empty() {
            return Ok(base.clone());
        }

        let invalid = |e: serde_json::Error| LintError::InvalidConfig {
            linter: linter.to_string(),
            reason: e.to_string(),
        };

        let mut merged = match serde_json::to_value(base).map_err(invalid)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.values {
            merged.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(merged)).map_err(invalid)
    }
}

/// Decodes a linter's base configuration from JSON.
///
/// # Errors
/// Returns `LintError::InvalidConfig` naming the linter on failure.
pub fn decode_config<T: DeserializeOwned>(linter: &str, value: &Value) -> Result<T, LintError> {
    serde_json::from_value(value.clone()).map_err(|e| LintError::InvalidConfig {
        linter: linter.to_string(),
        reason: e.to_string(),
    })
}

/// Checks files of one language.
#[async_trait]
pub trait Linter: Send + Sync {
    /// Stable name used in configuration and feedback.
    fn name(&self) -> &str;

    /// Whether this linter applies to `path`.
    fn can_handle(&self, path: &Path) -> bool;

    /// Replaces the base configuration.
    ///
    /// # Errors
    /// Returns `LintError::InvalidConfig` if `config` does not decode.
    fn configure(&self, config: &Value) -> Result<(), LintError>;

    /// Current base configuration as JSON.
    fn config(&self) -> Value;

    /// Lints one file's content.
    ///
    /// # Errors
    /// Returns `LintError` when the linter cannot run at all. Findings are
    /// reported through the returned [`LintReport`].
    async fn lint(
        &self,
        path: &Path,
        content: &[u8],
        overrides: &LintOverrides,
    ) -> Result<LintReport, LintError>;

    /// Lints several files, one after another by default.
    async fn lint_batch(
        &self,
        files: &[(PathBuf, Vec<u8>)],
        overrides: &LintOverrides,
    ) -> Vec<(PathBuf, Result<LintReport, LintError>)> {
        let mut results = Vec::with_capacity(files.len());
        for (path, content) in files {
            results.push((path.clone(), self.lint(path, content, overrides).await));
        }
        results
    }
}

/// Lower-cased extension of `path`, if any.
pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether the file on disk already holds `content`.
///
/// Tools that compile a whole package or crate read files from disk, so
/// their findings only describe `content` once it has been written.
pub(crate) async fn matches_disk(path: &Path, content: &[u8]) -> bool {
    tokio::fs::read(path).await.is_ok_and(|disk| disk == content)
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable shell script named `name` into `dir`.
    pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let tool = dir.join(name);
        std::fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        tool
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct SampleConfig {
        max_line_length: usize,
        strict: bool,
    }

    #[test]
    fn test_report_success_tracks_errors() {
        let path = Path::new("a.py");
        let mut report = LintReport::from_issues(vec![Issue::warning(path, 1, 1, "w", "W1")]);
        assert!(report.success);
        assert_eq!(report.warning_count(), 1);

        report.push(Issue::error(path, 2, 1, "e", "E1"));
        assert!(!report.success);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_severity_ordering_and_serialization() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(serde_json::to_value(Severity::Warning).unwrap(), "warning");
    }

    #[test]
    fn test_overrides_resolve_on_top_of_base() {
        let base = SampleConfig {
            max_line_length: 88,
            strict: false,
        };

        let empty = LintOverrides::default();
        assert_eq!(empty.resolve("sample", &base).unwrap(), base);

        let mut overrides = LintOverrides::default();
        overrides.merge(json!({"maxLineLength": 120}).as_object().unwrap());
        let resolved = overrides.resolve("sample", &base).unwrap();
        assert_eq!(resolved.max_line_length, 120);
        assert!(!resolved.strict);
        // The base is untouched
        assert_eq!(base.max_line_length, 88);
    }

    #[tokio::test]
    async fn test_matches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        assert!(!matches_disk(&file, b"fn a() {}").await);
        std::fs::write(&file, "fn a() {}").unwrap();
        assert!(matches_disk(&file, b"fn a() {}").await);
        assert!(!matches_disk(&file, b"fn b() {}").await);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let base = SampleConfig {
            max_line_length: 88,
            strict: false,
        };
        let overrides = LintOverrides::new(json!({"strict": "yes"}).as_object().unwrap().clone());
        assert!(matches!(
            overrides.resolve("sample", &base),
            Err(LintError::InvalidConfig { linter, .. }) if linter == "sample"
        ));
    }
}
