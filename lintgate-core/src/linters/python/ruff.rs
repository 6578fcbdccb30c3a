//! ruff integration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::linters::process::run_tool;
use crate::linters::{Issue, LintError};

const RUFF_TIMEOUT: Duration = Duration::from_secs(30);

/// How to invoke ruff: directly, or through `uv tool run`.
#[derive(Debug, Clone)]
pub(crate) struct RuffCommand {
    pub program: PathBuf,
    pub prefix: Vec<String>,
}

impl RuffCommand {
    fn args<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix
            .iter()
            .cloned()
            .chain(rest.into_iter().map(Into::into))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RuffDiagnostic {
    code: Option<String>,
    message: String,
    location: Option<RuffLocation>,
}

#[derive(Debug, Deserialize)]
struct RuffLocation {
    row: usize,
    column: usize,
}

/// Runs `ruff check` over stdin and converts each diagnostic to a warning.
///
/// # Errors
/// Returns `LintError::ToolFailed` if ruff's output is not the expected JSON.
pub(crate) async fn check(
    ruff: &RuffCommand,
    path: &Path,
    content: &[u8],
    extra_args: &[String],
) -> Result<Vec<Issue>, LintError> {
    let mut rest = vec!["check".to_string(), "--output-format".to_string(), "json".to_string()];
    rest.extend(extra_args.iter().cloned());
    rest.push("--stdin-filename".to_string());
    rest.push(path.display().to_string());
    rest.push("-".to_string());

    // ruff exits non-zero whenever it reports diagnostics
    let args = ruff.args(rest);
    let output = run_tool(&ruff.program, &args, Some(content), None, RUFF_TIMEOUT).await?;
    parse_check_output(path, &output.stdout)
}

fn parse_check_output(path: &Path, stdout: &str) -> Result<Vec<Issue>, LintError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let diagnostics: Vec<RuffDiagnostic> =
        serde_json::from_str(stdout).map_err(|e| LintError::ToolFailed {
            tool: "ruff".to_string(),
            reason: format!("failed to parse output: {e}"),
        })?;

    Ok(diagnostics
        .into_iter()
        .map(|d| {
            let (line, column) = d.location.map_or((1, 1), |l| (l.row, l.column));
            let rule = d.code.unwrap_or_else(|| "ruff".to_string());
            Issue::warning(path, line, column, d.message, &rule)
        })
        .collect())
}

/// Formats the content with `ruff format`.
///
/// Returns `Some(formatted)` when the output differs from the input.
///
/// # Errors
/// Returns `LintError::ToolFailed` when ruff cannot format the file.
pub(crate) async fn format(
    ruff: &RuffCommand,
    path: &Path,
    content: &[u8],
) -> Result<Option<String>, LintError> {
    let args = ruff.args([
        "format".to_string(),
        "--stdin-filename".to_string(),
        path.display().to_string(),
        "-".to_string(),
    ]);
    let output = run_tool(&ruff.program, &args, Some(content), None, RUFF_TIMEOUT).await?;
    if !output.success() {
        return Err(LintError::ToolFailed {
            tool: "ruff format".to_string(),
            reason: output.stderr.trim().to_string(),
        });
    }
    Ok((output.stdout.as_bytes() != content).then_some(output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linters::Severity;

    #[test]
    fn test_parse_ruff_json() {
        let stdout = r#"[
            {"code": "F401", "message": "`os` imported but unused",
             "location": {"row": 3, "column": 8}, "filename": "a.py"},
            {"code": null, "message": "SyntaxError: Expected an expression",
             "location": {"row": 5, "column": 1}, "filename": "a.py"}
        ]"#;
        let issues = parse_check_output(Path::new("a.py"), stdout).unwrap();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].rule, "F401");
        assert_eq!((issues[0].line, issues[0].column), (3, 8));
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[1].rule, "ruff");
    }

    #[test]
    fn test_empty_output_has_no_issues() {
        assert!(parse_check_output(Path::new("a.py"), "").unwrap().is_empty());
        assert!(parse_check_output(Path::new("a.py"), "not json").is_err());
    }

    #[test]
    fn test_uv_prefix_is_prepended() {
        let ruff = RuffCommand {
            program: PathBuf::from("/usr/bin/uv"),
            prefix: vec!["tool".to_string(), "run".to_string(), "ruff".to_string()],
        };
        assert_eq!(ruff.args(["check"]), vec!["tool", "run", "ruff", "check"]);
    }
}
