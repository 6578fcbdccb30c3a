//! Rust linter: rustfmt on the content, clippy on the enclosing crate

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::process::{ToolLocator, run_tool};
use super::{
    Issue, LintError, LintOverrides, LintReport, Linter, Severity, decode_config, extension,
    matches_disk,
};

const NAME: &str = "rust";
const RUSTFMT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RustConfig {
    pub edition: String,
    pub rustfmt: bool,
    pub clippy: bool,
    /// Extra `-W`/`-A` style flags passed after `--` to clippy
    pub clippy_args: Vec<String>,
    #[serde(with = "crate::config::duration::serde_duration")]
    pub clippy_timeout: Duration,
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            edition: "2021".to_string(),
            rustfmt: true,
            clippy: false,
            clippy_args: Vec::new(),
            clippy_timeout: Duration::from_secs(120),
        }
    }
}

pub struct RustLinter {
    config: RwLock<RustConfig>,
    tools: ToolLocator,
}

impl Default for RustLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl RustLinter {
    pub fn new() -> Self {
        Self::with_tools(ToolLocator::from_env())
    }

    pub fn with_tools(tools: ToolLocator) -> Self {
        Self {
            config: RwLock::new(RustConfig::default()),
            tools,
        }
    }

    async fn rustfmt(
        &self,
        path: &Path,
        content: &[u8],
        config: &RustConfig,
    ) -> Result<Option<String>, LintError> {
        let Some(rustfmt) = self.tools.find("rustfmt") else {
            tracing::debug!("rustfmt not found, skipping format check");
            return Ok(None);
        };
        let args = vec![
            "--emit".to_string(),
            "stdout".to_string(),
            "--edition".to_string(),
            config.edition.clone(),
        ];
        let output = run_tool(&rustfmt, &args, Some(content), None, RUSTFMT_TIMEOUT).await?;
        if !output.success() {
            // rustfmt refuses code that does not parse; clippy or the compiler reports that
            tracing::debug!(
                file = %path.display(),
                stderr = %output.stderr.trim(),
                "rustfmt failed"
            );
            return Ok(None);
        }
        Ok((output.stdout.as_bytes() != content).then_some(output.stdout))
    }

    async fn clippy(&self, path: &Path, config: &RustConfig) -> Result<Vec<Issue>, LintError> {
        let Some(cargo) = self.tools.find("cargo") else {
            tracing::debug!("cargo not found, skipping clippy");
            return Ok(Vec::new());
        };
        let Some(root) = find_manifest_dir(path) else {
            tracing::debug!(file = %path.display(), "No Cargo.toml above file, skipping clippy");
            return Ok(Vec::new());
        };

        let mut args = vec![
            "clippy".to_string(),
            "--message-format=json".to_string(),
            "--quiet".to_string(),
        ];
        if !config.clippy_args.is_empty() {
            args.push("--".to_string());
            args.extend(config.clippy_args.iter().cloned());
        }

        let output = run_tool(&cargo, &args, None, Some(&root), config.clippy_timeout).await?;
        Ok(parse_clippy_output(path, &root, &output.stdout))
    }
}

/// Directory of the closest `Cargo.toml` above `path`.
fn find_manifest_dir(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|dir| dir.join("Cargo.toml").is_file())
        .map(Path::to_path_buf)
}

#[derive(Debug, Deserialize)]
struct CargoMessage {
    reason: String,
    message: Option<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
    message: String,
    level: String,
    code: Option<DiagnosticCode>,
    #[serde(default)]
    spans: Vec<DiagnosticSpan>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct DiagnosticSpan {
    file_name: String,
    line_start: usize,
    column_start: usize,
    is_primary: bool,
}

/// Keeps diagnostics whose primary span points at `path`.
///
/// Span file names are relative to the workspace root, which may be any
/// ancestor of the package root `root`.
fn parse_clippy_output(path: &Path, root: &Path, stdout: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    for line in stdout.lines() {
        let Ok(msg) = serde_json::from_str::<CargoMessage>(line) else {
            continue;
        };
        if msg.reason != "compiler-message" {
            continue;
        }
        let Some(diag) = msg.message else { continue };
        let Some(span) = diag.spans.iter().find(|s| s.is_primary) else {
            continue;
        };
        let in_file = root
            .ancestors()
            .any(|base| same_file(&base.join(&span.file_name), path));
        if !in_file {
            continue;
        }
        let severity = match diag.level.as_str() {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        };
        let rule = diag.code.map_or_else(|| "clippy".to_string(), |c| c.code);
        issues.push(Issue::new(
            path,
            span.line_start,
            span.column_start,
            severity,
            diag.message,
            rule,
        ));
    }
    issues
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[async_trait]
impl Linter for RustLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension(path).as_deref() == Some("rs")
    }

    fn configure(&self, config: &Value) -> Result<(), LintError> {
        *self.config.write() = decode_config(NAME, config)?;
        Ok(())
    }

    fn config(&self) -> Value {
        serde_json::to_value(&*self.config.read()).unwrap_or(Value::Null)
    }

    async fn lint(
        &self,
        path: &Path,
        content: &[u8],
        overrides: &LintOverrides,
    ) -> Result<LintReport, LintError> {
        let config = overrides.resolve(NAME, &*self.config.read())?;
        let mut report = LintReport::clean();

        if config.rustfmt {
            if let Some(formatted) = self.rustfmt(path, content, &config).await? {
                report.push(Issue::warning(
                    path,
                    1,
                    1,
                    "File is not formatted with rustfmt",
                    "rustfmt",
                ));
                report.formatted = Some(formatted);
            }
        }

        if config.clippy {
            // clippy builds the crate from disk, so pending edits are not visible to it
            if matches_disk(path, content).await {
                report.extend(self.clippy(path, &config).await?);
            } else {
                tracing::debug!(file = %path.display(), "Content not on disk yet, skipping clippy");
            }
        }

        Ok(report)
    }
}
