//! JavaScript and TypeScript linter
//!
//! Delegates to the first available of biome, oxlint, eslint or `node
//! --check`. These tools read the file from disk, so content that is not
//! written yet (and files with no tool available) get the built-in checks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::brackets;
use super::process::{ToolLocator, ToolOutput, run_tool};
use super::{
    Issue, LintError, LintOverrides, LintReport, Linter, Severity, decode_config, extension,
    matches_disk,
};

const NAME: &str = "javascript";
const EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JavaScriptConfig {
    /// Use only this tool instead of the first one found
    pub force_tool: Option<String>,
    pub preferred_tools: Vec<String>,
    pub max_file_size: u64,
    #[serde(with = "crate::config::duration::serde_duration")]
    pub tool_timeout: Duration,
    /// Rule names dropped from the results, whichever tool reported them
    pub disabled_checks: Vec<String>,
}

impl Default for JavaScriptConfig {
    fn default() -> Self {
        Self {
            force_tool: None,
            preferred_tools: ["biome", "oxlint", "eslint", "node"].map(String::from).to_vec(),
            max_file_size: 10 * 1024 * 1024,
            tool_timeout: Duration::from_secs(30),
            disabled_checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Biome,
    Oxlint,
    Eslint,
    Node,
}

impl Tool {
    fn from_name(name: &str) -> Result<Self, LintError> {
        match name {
            "biome" => Ok(Self::Biome),
            "oxlint" => Ok(Self::Oxlint),
            "eslint" => Ok(Self::Eslint),
            "node" => Ok(Self::Node),
            other => Err(LintError::InvalidConfig {
                linter: NAME.to_string(),
                reason: format!("unknown tool '{other}'"),
            }),
        }
    }

    fn program(self) -> &'static str {
        match self {
            Self::Biome => "biome",
            Self::Oxlint => "oxlint",
            Self::Eslint => "eslint",
            Self::Node => "node",
        }
    }

    fn args(self, path: &Path) -> Vec<String> {
        let file = path.display().to_string();
        match self {
            Self::Biome => vec!["check".to_string(), "--reporter=json".to_string(), file],
            Self::Oxlint | Self::Eslint => vec!["--format=json".to_string(), file],
            Self::Node => vec!["--check".to_string(), file],
        }
    }
}

pub struct JavaScriptLinter {
    config: RwLock<JavaScriptConfig>,
    tools: ToolLocator,
}

impl Default for JavaScriptLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaScriptLinter {
    pub fn new() -> Self {
        Self::with_tools(ToolLocator::from_env())
    }

    pub fn with_tools(tools: ToolLocator) -> Self {
        Self {
            config: RwLock::new(JavaScriptConfig::default()),
            tools,
        }
    }

    /// Project-local `node_modules/.bin` wins over the search path.
    fn find_program(&self, path: &Path, program: &str) -> Option<PathBuf> {
        path.ancestors()
            .skip(1)
            .map(|dir| dir.join("node_modules").join(".bin").join(program))
            .find(|candidate| candidate.is_file())
            .or_else(|| self.tools.find(program))
    }

    fn select_tool(
        &self,
        path: &Path,
        config: &JavaScriptConfig,
    ) -> Result<Option<(Tool, PathBuf)>, LintError> {
        let candidates = match &config.force_tool {
            Some(forced) => vec![Tool::from_name(forced)?],
            None => config
                .preferred_tools
                .iter()
                .map(|name| Tool::from_name(name))
                .collect::<Result<_, _>>()?,
        };
        Ok(candidates.into_iter().find_map(|tool| {
            self.find_program(path, tool.program())
                .map(|program| (tool, program))
        }))
    }

    async fn run(
        &self,
        tool: Tool,
        program: &Path,
        path: &Path,
        config: &JavaScriptConfig,
    ) -> Result<Vec<Issue>, LintError> {
        let cwd = path.parent().filter(|dir| dir.is_dir());
        let output = run_tool(program, &tool.args(path), None, cwd, config.tool_timeout).await?;
        tracing::debug!(tool = tool.program(), exit = ?output.exit_code, "Tool finished");
        Ok(parse_tool_output(tool, path, &output))
    }
}

fn parse_tool_output(tool: Tool, path: &Path, output: &ToolOutput) -> Vec<Issue> {
    if tool == Tool::Node {
        return if output.success() {
            Vec::new()
        } else {
            vec![parse_node_error(path, &output.stderr)]
        };
    }
    if output.stdout.trim().is_empty() {
        return Vec::new();
    }
    let parsed = match tool {
        Tool::Biome => parse_biome(path, &output.stdout),
        Tool::Oxlint => parse_oxlint(path, &output.stdout),
        Tool::Eslint => parse_eslint(path, &output.stdout),
        Tool::Node => Ok(Vec::new()),
    };
    parsed.unwrap_or_else(|e| {
        vec![Issue::warning(
            path,
            1,
            1,
            format!("Failed to parse {} output: {e}", tool.program()),
            "parse-error",
        )]
    })
}

#[derive(Debug, Deserialize)]
struct BiomeReport {
    #[serde(default)]
    diagnostics: Vec<BiomeDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct BiomeDiagnostic {
    #[serde(default)]
    category: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<BiomeText>,
    #[serde(default)]
    location: Option<BiomeLocation>,
}

#[derive(Debug, Deserialize)]
struct BiomeText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BiomeLocation {
    /// Byte offsets in some biome versions, line and column in others
    #[serde(default)]
    span: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BiomeSpan {
    start: Position,
}

#[derive(Debug, Default, Deserialize)]
struct Position {
    #[serde(default)]
    line: usize,
    #[serde(default)]
    column: usize,
}

fn parse_biome(path: &Path, stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    let report: BiomeReport = serde_json::from_str(stdout)?;
    Ok(report
        .diagnostics
        .into_iter()
        .map(|diag| {
            let start = diag
                .location
                .and_then(|l| l.span)
                .and_then(|span| serde_json::from_value::<BiomeSpan>(span).ok())
                .map(|s| s.start)
                .unwrap_or_default();
            let message = diag
                .message
                .map(|m| m.text)
                .or(diag.description)
                .unwrap_or_default();
            Issue::new(
                path,
                start.line.max(1),
                start.column.max(1),
                tool_severity(&diag.severity),
                message,
                diag.category,
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct OxlintDiagnostic {
    #[serde(default)]
    severity: String,
    message: String,
    #[serde(default)]
    location: Position,
    #[serde(default)]
    rule: String,
}

fn parse_oxlint(path: &Path, stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    let diagnostics: Vec<OxlintDiagnostic> = serde_json::from_str(stdout)?;
    Ok(diagnostics
        .into_iter()
        .map(|diag| {
            Issue::new(
                path,
                diag.location.line.max(1),
                diag.location.column.max(1),
                tool_severity(&diag.severity),
                diag.message,
                diag.rule,
            )
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFile {
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    rule_id: Option<String>,
    /// 1 = warning, 2 = error
    severity: u8,
    message: String,
    #[serde(default)]
    line: usize,
    #[serde(default)]
    column: usize,
    #[serde(default)]
    fatal: bool,
}

fn parse_eslint(path: &Path, stdout: &str) -> Result<Vec<Issue>, serde_json::Error> {
    let files: Vec<EslintFile> = serde_json::from_str(stdout)?;
    Ok(files
        .into_iter()
        .flat_map(|file| file.messages)
        .map(|msg| {
            let severity = if msg.severity >= 2 {
                Severity::Error
            } else {
                Severity::Warning
            };
            // Parse errors carry no rule id
            let rule = msg.rule_id.unwrap_or_else(|| {
                if msg.fatal { "syntax" } else { "eslint" }.to_string()
            });
            Issue::new(path, msg.line.max(1), msg.column.max(1), severity, msg.message, rule)
        })
        .collect())
}

fn tool_severity(severity: &str) -> Severity {
    match severity {
        "error" | "fatal" => Severity::Error,
        "information" | "info" | "hint" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// Reads `<file>:<line>` and the `SyntaxError: ...` line from node's stderr.
fn parse_node_error(path: &Path, stderr: &str) -> Issue {
    let line = stderr
        .lines()
        .next()
        .and_then(|first| first.rsplit_once(':'))
        .and_then(|(_, line)| line.trim().parse().ok())
        .unwrap_or(1);
    let message = stderr
        .lines()
        .find(|l| l.contains("SyntaxError"))
        .unwrap_or_else(|| stderr.trim())
        .trim()
        .to_string();
    Issue::error(path, line, 1, message, "syntax")
}

/// Built-in checks: bracket balance outside strings and comments, and a
/// spacing hint for anonymous functions.
fn basic_checks(path: &Path, source: &str) -> Vec<Issue> {
    let mut issues = brackets::unbalanced(path, source, &['"', '\'', '`'], "basic-syntax");
    for (idx, text) in source.lines().enumerate() {
        let trimmed = text.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with('*') {
            continue;
        }
        if let Some(col) = text.find("function(") {
            issues.push(Issue::new(
                path,
                idx + 1,
                col + 1,
                Severity::Info,
                "Consider adding space after 'function'",
                "basic-style",
            ));
        }
    }
    issues.sort_by_key(|i| (i.line, i.column));
    issues
}

#[async_trait]
impl Linter for JavaScriptLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
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
            return Ok(LintReport::from_issues(vec![Issue::error(
                path,
                1,
                1,
                format!(
                    "File size {} exceeds limit {}",
                    content.len(),
                    config.max_file_size
                ),
                "file-size",
            )]));
        }

        let written = matches_disk(path, content).await;
        let issues = match self.select_tool(path, &config)? {
            Some((tool, program)) if written => self.run(tool, &program, path, &config).await?,
            Some((tool, _)) => {
                tracing::debug!(tool = tool.program(), "Content not on disk yet, skipping tool");
                basic_checks(path, &String::from_utf8_lossy(content))
            }
            None => {
                tracing::debug!(file = %path.display(), "No tool found, checking it in-process");
                basic_checks(path, &String::from_utf8_lossy(content))
            }
        };

        Ok(LintReport::from_issues(
            issues
                .into_iter()
                .filter(|issue| !config.disabled_checks.contains(&issue.rule))
                .collect(),
        ))
    }
}
