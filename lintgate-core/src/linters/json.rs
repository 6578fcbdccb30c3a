//! JSON and JSON Lines linter

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Issue, LintError, LintOverrides, LintReport, Linter, decode_config, extension};

const NAME: &str = "json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonConfig {
    /// Bytes; larger files are rejected without parsing
    pub max_file_size: u64,
    /// Detect JSON Lines content in files without a JSON Lines extension
    pub format_detection: bool,
    pub pretty_print: bool,
    pub disabled_checks: Vec<String>,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            format_detection: true,
            pretty_print: false,
            disabled_checks: Vec::new(),
        }
    }
}

impl JsonConfig {
    fn is_check_enabled(&self, check: &str) -> bool {
        !self.disabled_checks.iter().any(|c| c == check)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Document,
    Lines,
}

pub struct JsonLinter {
    config: RwLock<JsonConfig>,
}

impl Default for JsonLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonLinter {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(JsonConfig::default()),
        }
    }
}

fn detect_format(path: &Path, content: &str, config: &JsonConfig) -> Format {
    if matches!(extension(path).as_deref(), Some("jsonl" | "ndjson")) {
        return Format::Lines;
    }
    if config.format_detection && looks_like_json_lines(content) {
        return Format::Lines;
    }
    Format::Document
}

/// More than one non-empty line, most of them single-line objects.
fn looks_like_json_lines(content: &str) -> bool {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(10)
        .collect();
    let objects = lines
        .iter()
        .filter(|l| l.starts_with('{') && l.ends_with('}'))
        .count();
    lines.len() > 1 && objects > lines.len() / 2
}

fn syntax_issue(path: &Path, err: &serde_json::Error, line_offset: usize, prefix: &str) -> Issue {
    Issue::error(
        path,
        err.line().max(1) + line_offset,
        err.column().max(1),
        format!("{prefix}{err}"),
        "syntax",
    )
}

fn validate_document(path: &Path, content: &str) -> (Vec<Issue>, Option<Value>) {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => (Vec::new(), Some(value)),
        Err(e) => (vec![syntax_issue(path, &e, 0, "Invalid JSON syntax: ")], None),
    }
}

fn validate_lines(path: &Path, content: &str) -> (Vec<Issue>, Vec<Value>) {
    let mut issues = Vec::new();
    let mut values = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(e) => issues.push(syntax_issue(
                path,
                &e,
                index,
                &format!("Invalid JSON syntax on line {}: ", index + 1),
            )),
        }
    }
    (issues, values)
}

#[async_trait]
impl Linter for JsonLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        matches!(
            extension(path).as_deref(),
            Some("json" | "jsonl" | "ndjson" | "geojson")
        )
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

        let text = match std::str::from_utf8(content) {
            Ok(text) => text,
            Err(e) => {
                return Ok(LintReport::from_issues(vec![Issue::error(
                    path,
                    1,
                    1,
                    format!("File is not valid UTF-8: {e}"),
                    "encoding",
                )]));
            }
        };

        let format = detect_format(path, text, &config);
        let check_syntax = config.is_check_enabled("syntax");

        let (issues, formatted) = match format {
            Format::Document => {
                let (issues, value) = validate_document(path, text);
                let formatted = value
                    .filter(|_| config.pretty_print)
                    .and_then(|v| serde_json::to_string_pretty(&v).ok())
                    .map(|mut s| {
                        s.push('\n');
                        s
                    });
                (issues, formatted)
            }
            Format::Lines => {
                let (issues, values) = validate_lines(path, text);
                let formatted = config.pretty_print.then(|| {
                    values
                        .iter()
                        .filter_map(|v| serde_json::to_string(v).ok())
                        .map(|line| line + "\n")
                        .collect::<String>()
                });
                (issues, formatted)
            }
        };

        let mut report = LintReport::from_issues(if check_syntax { issues } else { Vec::new() });
        if let Some(formatted) = formatted.filter(|f| f != text) {
            if config.is_check_enabled("formatting") {
                report.push(Issue::warning(
                    path,
                    1,
                    1,
                    "File is not formatted",
                    "formatting",
                ));
            }
            report.formatted = Some(formatted);
        }
        Ok(report)
    }
}
