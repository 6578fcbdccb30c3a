//! Protocol Buffers linter: buf, protolint or protoc, whichever is found first

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::brackets;
use super::process::{ToolLocator, ToolOutput, run_tool};
use super::{
    Issue, LintError, LintOverrides, LintReport, Linter, Severity, decode_config, extension,
    matches_disk,
};

const NAME: &str = "protobuf";

static PROTOC_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?\.proto):(\d+):(\d+): (.+)$").expect("valid protoc line pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtobufConfig {
    pub force_tool: Option<String>,
    pub preferred_tools: Vec<String>,
    /// Larger files are skipped
    pub max_file_size: u64,
    #[serde(with = "crate::config::duration::serde_duration")]
    pub tool_timeout: Duration,
    pub buf_config_path: Option<PathBuf>,
    pub protolint_config: Option<PathBuf>,
    pub disabled_checks: Vec<String>,
}

impl Default for ProtobufConfig {
    fn default() -> Self {
        Self {
            force_tool: None,
            preferred_tools: ["buf", "protolint", "protoc"].map(String::from).to_vec(),
            max_file_size: 10 * 1024 * 1024,
            tool_timeout: Duration::from_secs(120),
            buf_config_path: None,
            protolint_config: None,
            disabled_checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Buf,
    Protolint,
    Protoc,
}

impl Tool {
    fn from_name(name: &str) -> Result<Self, LintError> {
        match name {
            "buf" => Ok(Self::Buf),
            "protolint" => Ok(Self::Protolint),
            "protoc" => Ok(Self::Protoc),
            other => Err(LintError::InvalidConfig {
                linter: NAME.to_string(),
                reason: format!("unknown tool '{other}'"),
            }),
        }
    }

    fn program(self) -> &'static str {
        match self {
            Self::Buf => "buf",
            Self::Protolint => "protolint",
            Self::Protoc => "protoc",
        }
    }
}

/// Directory holding `buf.work.yaml` or `buf.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoWorkspace {
    pub root: PathBuf,
    pub config: PathBuf,
    /// `buf.work.yaml` rather than a single module's `buf.yaml`
    pub is_workspace: bool,
}

/// Closest buf workspace or module at or above `start`.
///
/// At each level `buf.work.yaml` is preferred over `buf.yaml`.
pub fn find_proto_workspace(start: &Path) -> Option<ProtoWorkspace> {
    let dir = if start.is_dir() { start } else { start.parent()? };
    dir.ancestors().find_map(|dir| {
        let work = dir.join("buf.work.yaml");
        if work.is_file() {
            return Some(ProtoWorkspace {
                root: dir.to_path_buf(),
                config: work,
                is_workspace: true,
            });
        }
        let module = dir.join("buf.yaml");
        module.is_file().then(|| ProtoWorkspace {
            root: dir.to_path_buf(),
            config: module,
            is_workspace: false,
        })
    })
}

/// Whether a tool reported `reported` for the linted file `path`.
fn names_file(path: &Path, reported: &str) -> bool {
    let reported = Path::new(reported);
    !reported.as_os_str().is_empty() && (reported == path || path.ends_with(reported))
}

#[derive(Debug, Deserialize)]
struct BufAnnotation {
    path: String,
    #[serde(default)]
    start_line: usize,
    #[serde(default)]
    start_column: usize,
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// buf prints one JSON annotation per line.
fn parse_buf_output(path: &Path, output: &ToolOutput) -> Result<Vec<Issue>, LintError> {
    let annotations: Vec<BufAnnotation> = output
        .stdout
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    if annotations.is_empty() && !output.success() && !output.stderr.trim().is_empty() {
        return Err(LintError::ToolFailed {
            tool: "buf".to_string(),
            reason: output.stderr.trim().to_string(),
        });
    }
    Ok(annotations
        .into_iter()
        .filter(|a| names_file(path, &a.path))
        .map(|a| {
            let severity = if a.kind == "COMPILE" || a.kind.to_ascii_lowercase().contains("error") {
                Severity::Error
            } else {
                Severity::Warning
            };
            Issue::new(
                path,
                a.start_line.max(1),
                a.start_column.max(1),
                severity,
                a.message,
                a.kind,
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ProtolintReport {
    #[serde(default)]
    lints: Vec<ProtolintLint>,
}

#[derive(Debug, Deserialize)]
struct ProtolintLint {
    filename: String,
    line: usize,
    column: usize,
    message: String,
    rule: String,
}

fn parse_protolint_output(path: &Path, output: &ToolOutput) -> Result<Vec<Issue>, LintError> {
    let report: ProtolintReport =
        serde_json::from_str(&output.stdout).map_err(|e| LintError::ToolFailed {
            tool: "protolint".to_string(),
            reason: if output.stderr.trim().is_empty() {
                format!("unreadable output: {e}")
            } else {
                output.stderr.trim().to_string()
            },
        })?;
    Ok(report
        .lints
        .into_iter()
        .filter(|lint| names_file(path, &lint.filename))
        .map(|lint| {
            Issue::warning(path, lint.line.max(1), lint.column.max(1), lint.message, &lint.rule)
        })
        .collect())
}

/// protoc stops at the first broken file; every `file:line:col: msg` line
/// for `path` becomes a syntax error.
fn parse_protoc_output(path: &Path, output: &ToolOutput) -> Vec<Issue> {
    if output.success() {
        return Vec::new();
    }
    let name = path.file_name();
    let issues: Vec<Issue> = output
        .stderr
        .lines()
        .filter_map(|line| PROTOC_LINE_RE.captures(line.trim()))
        .filter(|caps| Path::new(&caps[1]).file_name() == name)
        .filter_map(|caps| {
            let line = caps[2].parse().ok()?;
            let column = caps[3].parse().ok()?;
            Some(Issue::error(path, line, column, &caps[4], "syntax"))
        })
        .collect();
    if issues.is_empty() {
        let message = format!("protoc validation failed: {}", output.stderr.trim());
        return vec![Issue::error(path, 1, 1, message, "syntax")];
    }
    issues
}

pub struct ProtobufLinter {
    config: RwLock<ProtobufConfig>,
    tools: ToolLocator,
}

impl Default for ProtobufLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtobufLinter {
    pub fn new() -> Self {
        Self::with_tools(ToolLocator::from_env())
    }

    pub fn with_tools(tools: ToolLocator) -> Self {
        Self {
            config: RwLock::new(ProtobufConfig::default()),
            tools,
        }
    }

    fn candidates(&self, config: &ProtobufConfig) -> Result<Vec<(Tool, PathBuf)>, LintError> {
        let names = match &config.force_tool {
            Some(forced) => std::slice::from_ref(forced),
            None => config.preferred_tools.as_slice(),
        };
        let mut found = Vec::new();
        for name in names {
            let tool = Tool::from_name(name)?;
            if let Some(program) = self.tools.find(tool.program()) {
                found.push((tool, program));
            }
        }
        Ok(found)
    }

    async fn run(
        &self,
        tool: Tool,
        program: &Path,
        path: &Path,
        config: &ProtobufConfig,
    ) -> Result<Vec<Issue>, LintError> {
        let dir = path.parent().filter(|d| d.is_dir());
        match tool {
            Tool::Buf => {
                let workspace = find_proto_workspace(path);
                let cwd = workspace.as_ref().map(|w| w.root.as_path()).or(dir);
                let mut args = vec!["lint".to_string(), "--error-format=json".to_string()];
                if let Some(buf_config) = &config.buf_config_path {
                    args.push("--config".to_string());
                    args.push(buf_config.display().to_string());
                }
                args.push("--path".to_string());
                args.push(path.display().to_string());
                let output = run_tool(program, &args, None, cwd, config.tool_timeout).await?;
                parse_buf_output(path, &output)
            }
            Tool::Protolint => {
                let mut args = vec![
                    "lint".to_string(),
                    "-reporter".to_string(),
                    "json".to_string(),
                ];
                if let Some(protolint_config) = &config.protolint_config {
                    args.push("-config_path".to_string());
                    args.push(protolint_config.display().to_string());
                }
                args.push(path.display().to_string());
                let output = run_tool(program, &args, None, dir, config.tool_timeout).await?;
                parse_protolint_output(path, &output)
            }
            Tool::Protoc => {
                let scratch = tempfile::tempdir()?;
                let mut args = Vec::new();
                if let Some(dir) = dir {
                    args.push(format!("--proto_path={}", dir.display()));
                }
                args.push(format!(
                    "--descriptor_set_out={}",
                    scratch.path().join("descriptor.pb").display()
                ));
                args.push(path.display().to_string());
                let output = run_tool(program, &args, None, None, config.tool_timeout).await?;
                Ok(parse_protoc_output(path, &output))
            }
        }
    }
}

#[async_trait]
impl Linter for ProtobufLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension(path).as_deref() == Some("proto")
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
        if content.len() as u64 > config.max_file_size {
            tracing::debug!(file = %path.display(), size = content.len(), "Skipping large file");
            return Ok(LintReport::clean());
        }

        let candidates = self.candidates(&config)?;
        let source = String::from_utf8_lossy(content);
        let issues = if candidates.is_empty() {
            let mut issues = brackets::unbalanced(path, &source, &['"', '\''], "basic-syntax");
            issues.push(Issue::warning(
                path,
                1,
                1,
                "No protobuf linting tools available (buf, protolint, or protoc)",
                "tool-availability",
            ));
            issues
        } else if !matches_disk(path, content).await {
            tracing::debug!(file = %path.display(), "Content not on disk yet, skipping tools");
            brackets::unbalanced(path, &source, &['"', '\''], "basic-syntax")
        } else {
            let mut outcome = Ok(Vec::new());
            for (tool, program) in &candidates {
                outcome = self.run(*tool, program, path, &config).await;
                match &outcome {
                    Ok(_) => break,
                    Err(e) => tracing::debug!(tool = tool.program(), "Proto tool failed: {e}"),
                }
            }
            outcome?
        };

        Ok(LintReport::from_issues(
            issues
                .into_iter()
                .filter(|issue| !config.disabled_checks.contains(&issue.rule))
                .collect(),
        ))
    }
}
