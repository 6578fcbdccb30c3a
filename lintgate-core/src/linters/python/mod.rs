//! Python linter
//!
//! Runs a syntax check, then style checks (ruff when installed, built-in
//! rules otherwise), a format check and, for test modules, the test runner.

pub mod checks;
pub mod config;
mod ruff;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

pub use config::PythonConfig;

use self::ruff::RuffCommand;
use super::process::{ToolLocator, run_tool};
use super::{Issue, LintError, LintOverrides, LintReport, Linter, decode_config, extension};

const NAME: &str = "python";
const SYNTAX_TIMEOUT: Duration = Duration::from_secs(10);

const SYNTAX_SCRIPT: &str = r#"import ast, sys
src = sys.stdin.buffer.read()
try:
    ast.parse(src, sys.argv[1])
except SyntaxError as e:
    print(f"{e.lineno or 1}:{e.offset or 1}:{e.msg}")
    sys.exit(1)
"#;

/// True for pytest-style test modules: `test_*.py` and `*_test.py`.
pub fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".py") && (name.starts_with("test_") || name.ends_with("_test.py"))
}

/// Sibling test module for a source file: `pkg/foo.py` -> `pkg/test_foo.py`.
pub fn sibling_test_file(path: &Path) -> Option<PathBuf> {
    if is_test_file(path) || extension(path).as_deref() != Some("py") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(path.with_file_name(format!("test_{stem}.py")))
}

pub struct PythonLinter {
    config: RwLock<PythonConfig>,
    tools: ToolLocator,
}

impl Default for PythonLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonLinter {
    pub fn new() -> Self {
        Self::with_tools(ToolLocator::from_env())
    }

    pub fn with_tools(tools: ToolLocator) -> Self {
        Self {
            config: RwLock::new(PythonConfig::default()),
            tools,
        }
    }

    fn ruff(&self) -> Option<RuffCommand> {
        if let Some(program) = self.tools.find("ruff") {
            return Some(RuffCommand {
                program,
                prefix: Vec::new(),
            });
        }
        self.tools.find("uv").map(|program| RuffCommand {
            program,
            prefix: vec!["tool".to_string(), "run".to_string(), "ruff".to_string()],
        })
    }

    async fn check_syntax(&self, path: &Path, content: &[u8]) -> Option<Issue> {
        if let Some(python) = self.tools.find("python3") {
            let args = vec![
                "-c".to_string(),
                SYNTAX_SCRIPT.to_string(),
                path.display().to_string(),
            ];
            match run_tool(&python, &args, Some(content), None, SYNTAX_TIMEOUT).await {
                Ok(output) if output.success() => return None,
                Ok(output) => {
                    if let Some(issue) = parse_syntax_report(path, &output.stdout) {
                        return Some(issue);
                    }
                    tracing::debug!(output = %output.combined(), "Unexpected syntax check output");
                }
                Err(e) => tracing::debug!("python3 syntax check unavailable: {e}"),
            }
        }

        let text = String::from_utf8_lossy(content);
        checks::scan_syntax(&text).map(|(line, column, message)| {
            Issue::error(path, line, column, format!("Syntax error: {message}"), "syntax")
        })
    }

    async fn style_issues(
        &self,
        path: &Path,
        content: &[u8],
        config: &PythonConfig,
    ) -> Vec<Issue> {
        if config.use_ruff {
            if let Some(ruff) = self.ruff() {
                return match ruff::check(&ruff, path, content, &config.ruff_args).await {
                    Ok(issues) => issues
                        .into_iter()
                        .filter(|i| config.is_rule_enabled(&i.rule))
                        .collect(),
                    Err(e) => {
                        let message = format!("Ruff check failed: {e}");
                        vec![Issue::warning(path, 1, 1, message, "ruff")]
                    }
                };
            }
        }
        checks::check_source(path, &String::from_utf8_lossy(content), config)
    }

    async fn run_tests(
        &self,
        path: &Path,
        content: &[u8],
        config: &PythonConfig,
    ) -> Result<LintReport, LintError> {
        let (program, mut args) = match self.tools.find(&config.test_runner) {
            Some(program) => (program, Vec::new()),
            None => match self.tools.find("uv") {
                Some(uv) => (uv, vec!["run".to_string(), config.test_runner.clone()]),
                None => {
                    tracing::debug!(
                        runner = %config.test_runner,
                        "Test runner not found, skipping tests"
                    );
                    return Ok(LintReport::clean());
                }
            },
        };

        let file_name = path
            .file_name()
            .map_or_else(|| "test_module.py".into(), |n| n.to_os_string());
        let dir = tempfile::tempdir()?;
        let test_file = dir.path().join(file_name);
        tokio::fs::write(&test_file, content).await?;

        args.extend(config.test_args.iter().cloned());
        args.push(test_file.display().to_string());

        tracing::info!(file = %path.display(), runner = %config.test_runner, "Running tests");
        let run = run_tool(&program, &args, None, Some(dir.path()), config.test_timeout);
        let output = match run.await {
            Ok(output) => output,
            Err(LintError::Timeout { timeout, .. }) => {
                return Ok(LintReport::from_issues(vec![Issue::error(
                    path,
                    1,
                    1,
                    format!("Tests timed out after {timeout:?}"),
                    "test",
                )]));
            }
            Err(e) => return Err(e),
        };

        let mut report = if output.success() {
            LintReport::clean()
        } else {
            LintReport::from_issues(vec![Issue::error(path, 1, 1, "Tests failed", "test")])
        };
        report.test_output = Some(output.combined());
        Ok(report)
    }
}

fn parse_syntax_report(path: &Path, stdout: &str) -> Option<Issue> {
    let mut parts = stdout.trim().splitn(3, ':');
    let line = parts.next()?.parse().ok()?;
    let column = parts.next()?.parse().ok()?;
    let message = parts.next()?;
    Some(Issue::error(path, line, column, format!("Syntax error: {message}"), "syntax"))
}

#[async_trait]
impl Linter for PythonLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        matches!(extension(path).as_deref(), Some("py" | "pyi"))
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
        let config = {
            let base = self.config.read();
            overrides.resolve(NAME, &*base)?
        };

        if config.syntax_check {
            if let Some(issue) = self.check_syntax(path, content).await {
                return Ok(LintReport::from_issues(vec![issue]));
            }
        }

        let mut report = LintReport::from_issues(self.style_issues(path, content, &config).await);

        if config.use_ruff && config.is_rule_enabled("format") {
            if let Some(ruff) = self.ruff() {
                match ruff::format(&ruff, path, content).await {
                    Ok(Some(formatted)) => {
                        report.push(Issue::warning(path, 1, 1, "File needs formatting", "format"));
                        report.formatted = Some(formatted);
                    }
                    Ok(None) => {}
                    Err(e) => report.push(Issue::warning(
                        path,
                        1,
                        1,
                        format!("Ruff format check failed: {e}"),
                        "format",
                    )),
                }
            }
        }

        if config.run_tests && is_test_file(path) {
            let tests = self.run_tests(path, content, &config).await?;
            report.extend(tests.issues);
            report.test_output = tests.test_output;
        }

        tracing::debug!(
            file = %path.display(),
            issues = report.issues.len(),
            "Python lint finished"
        );
        Ok(report)
    }
}
