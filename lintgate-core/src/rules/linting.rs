//! Rule engine that lints the files an agent writes

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{RuleEngine, RuleResult, format_feedback};
use crate::config::{GateConfig, RuleOverride};
use crate::hook::{HookResponse, PostToolUseMessage, PreToolUseMessage, ToolInput};
use crate::linters::{
    GoLinter, JavaScriptLinter, JsonLinter, LintError, LintOverrides, LintReport, Linter,
    LinterFailure, MarkdownLinter, ParallelExecutor, ProtobufLinter, PythonLinter, RustLinter,
    ToolLocator, aggregate_results, golang, python,
};

/// Lints written files and turns findings into hook responses.
pub struct LintingRuleEngine {
    linters: Vec<Arc<dyn Linter>>,
    executor: ParallelExecutor,
    config: GateConfig,
}

impl Default for LintingRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LintingRuleEngine {
    /// Engine with the built-in linters and default configuration.
    pub fn new() -> Self {
        Self::with_linters(default_linters(&ToolLocator::from_env()))
    }

    pub fn with_linters(linters: Vec<Arc<dyn Linter>>) -> Self {
        Self {
            linters,
            executor: ParallelExecutor::default(),
            config: GateConfig::default(),
        }
    }

    pub fn add_linter(&mut self, linter: Arc<dyn Linter>) {
        self.linters.push(linter);
    }

    /// Installs `config`: configures each enabled linter and sizes the
    /// worker pool.
    ///
    /// # Errors
    /// Returns `LintError::InvalidConfig` when a linter rejects its
    /// configuration block.
    pub fn set_config(&mut self, config: GateConfig) -> Result<(), LintError> {
        for linter in &self.linters {
            if !config.is_linter_enabled(linter.name()) {
                continue;
            }
            if let Some(value) = config.linter_config(linter.name()) {
                linter.configure(value)?;
            }
        }
        self.executor = ParallelExecutor::new(config.max_workers());
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn linters(&self) -> &[Arc<dyn Linter>] {
        &self.linters
    }

    /// Enabled linters that handle `path`.
    pub fn linters_for(&self, path: &Path) -> Vec<Arc<dyn Linter>> {
        self.linters
            .iter()
            .filter(|l| self.config.is_linter_enabled(l.name()) && l.can_handle(path))
            .cloned()
            .collect()
    }

    /// Merges every rule override matching `path` for `linter`, in order.
    pub fn effective_overrides(&self, path: &Path, linter: &str) -> LintOverrides {
        let mut overrides = LintOverrides::default();
        for rules in self.config.rule_overrides(path, linter) {
            overrides.merge(rules);
        }
        overrides
    }

    /// Lints `content` as if it were stored at `path`.
    pub async fn lint_content(
        &self,
        path: &Path,
        content: &[u8],
    ) -> (LintReport, Vec<LinterFailure>) {
        let linters = self.linters_for(path);
        if linters.is_empty() {
            return (LintReport::clean(), Vec::new());
        }
        let results = self
            .executor
            .execute_linters(&linters, path, content, |name| self.effective_overrides(path, name))
            .await;
        aggregate_results(results)
    }

    /// Reads `path` from disk and lints it.
    ///
    /// # Errors
    /// Returns the I/O error when the file cannot be read.
    pub async fn lint_file(
        &self,
        path: &Path,
    ) -> std::io::Result<(LintReport, Vec<LinterFailure>)> {
        let content = tokio::fs::read(path).await?;
        Ok(self.lint_content(path, &content).await)
    }

    /// What would happen when `path` is linted.
    pub fn describe_file(&self, path: &Path) -> FileActions {
        let linters = self
            .linters
            .iter()
            .filter(|l| l.can_handle(path))
            .map(|linter| {
                let name = linter.name();
                let base_config = linter.config();
                let rules: Vec<RuleOverride> = self
                    .config
                    .matching_rules(path, name)
                    .into_iter()
                    .cloned()
                    .collect();
                let effective_config = overlay(&base_config, &self.effective_overrides(path, name));
                LinterAction {
                    name: name.to_string(),
                    enabled: self.config.is_linter_enabled(name),
                    base_config,
                    rules,
                    effective_config,
                }
            })
            .collect();
        FileActions {
            path: path.to_path_buf(),
            linters,
        }
    }

    async fn feedback_for_written_file(&self, path: &Path) -> Option<String> {
        let mut sections = Vec::new();

        match self.lint_file(path).await {
            Ok((report, failures)) => {
                if report.has_issues() || !failures.is_empty() {
                    sections.push(format_feedback(path, &report, &failures));
                }
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), "Cannot read written file: {e}");
                return None;
            }
        }

        for test_file in sibling_test_files(path) {
            let Ok((report, failures)) = self.lint_file(&test_file).await else {
                continue;
            };
            tracing::debug!(file = %test_file.display(), "Linted sibling test file");
            if report.has_issues() || !failures.is_empty() {
                sections.push(format_feedback(&test_file, &report, &failures));
            }
        }

        (!sections.is_empty()).then(|| sections.join("\n\n"))
    }
}

/// The built-in linters, resolving external tools through `tools`.
pub fn default_linters(tools: &ToolLocator) -> Vec<Arc<dyn Linter>> {
    vec![
        Arc::new(PythonLinter::with_tools(tools.clone())),
        Arc::new(JsonLinter::new()),
        Arc::new(MarkdownLinter::new()),
        Arc::new(RustLinter::with_tools(tools.clone())),
        Arc::new(GoLinter::with_tools(tools.clone())),
        Arc::new(JavaScriptLinter::with_tools(tools.clone())),
        Arc::new(ProtobufLinter::with_tools(tools.clone())),
    ]
}

/// Existing test files that belong to the source file at `path`.
fn sibling_test_files(path: &Path) -> Vec<PathBuf> {
    [golang::sibling_test_file(path), python::sibling_test_file(path)]
        .into_iter()
        .flatten()
        .filter(|p| p.is_file())
        .collect()
}

fn overlay(base: &Value, overrides: &LintOverrides) -> Value {
    let mut merged = base.clone();
    if let Value::Object(map) = &mut merged {
        for (key, value) in overrides.values() {
            map.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[async_trait]
impl RuleEngine for LintingRuleEngine {
    async fn evaluate_pre_tool_use(&self, msg: &PreToolUseMessage) -> RuleResult {
        let input = match ToolInput::parse(&msg.tool_name, &msg.tool_input) {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!("Skipping pre-write lint: {e}");
                return Ok(Some(HookResponse::approve()));
            }
        };

        // Edits only exist on disk after the tool ran
        let ToolInput::Write { file_path, content } = input else {
            return Ok(Some(HookResponse::approve()));
        };
        if file_path.is_empty() {
            return Ok(Some(HookResponse::approve()));
        }

        let path = Path::new(&file_path);
        let (report, failures) = self.lint_content(path, content.as_bytes()).await;
        if !report.has_issues() && failures.is_empty() {
            return Ok(Some(HookResponse::approve()));
        }

        let feedback = format_feedback(path, &report, &failures);
        let errors = report.error_count();
        if errors > 0 {
            tracing::info!(file = %file_path, errors, "Blocking write with lint errors");
            return Ok(Some(HookResponse::block(format!(
                "Found {errors} error(s) in {file_path}\n\n{feedback}"
            ))));
        }
        Ok(Some(HookResponse::approve().with_message(feedback)))
    }

    async fn evaluate_post_tool_use(&self, msg: &PostToolUseMessage) -> RuleResult {
        if let Some(error) = &msg.tool_error {
            tracing::debug!(
                tool = %msg.tool_name,
                "Tool reported an error, skipping lint: {error}"
            );
            return Ok(None);
        }

        let input = match ToolInput::parse(&msg.tool_name, &msg.tool_input) {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!("Skipping post-write lint: {e}");
                return Ok(None);
            }
        };
        if !input.is_file_modification() {
            return Ok(None);
        }
        let Some(path) = input.file_path() else {
            return Ok(None);
        };

        Ok(self
            .feedback_for_written_file(path)
            .await
            .map(HookResponse::block))
    }
}

/// Linting plan for one file, as printed by `show-actions`.
#[derive(Debug, Clone, Serialize)]
pub struct FileActions {
    pub path: PathBuf,
    pub linters: Vec<LinterAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinterAction {
    pub name: String,
    pub enabled: bool,
    pub base_config: Value,
    pub rules: Vec<RuleOverride>,
    pub effective_config: Value,
}

impl fmt::Display for FileActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        if self.linters.is_empty() {
            return writeln!(f, "  no linter handles this file");
        }
        for action in &self.linters {
            let state = if action.enabled { "enabled" } else { "disabled" };
            writeln!(f, "  linter: {} ({state})", action.name)?;
            writeln!(f, "    base config: {}", action.base_config)?;
            if action.rules.is_empty() {
                writeln!(f, "    matching rules: none")?;
            } else {
                writeln!(f, "    matching rules:")?;
                for (index, rule) in action.rules.iter().enumerate() {
                    writeln!(
                        f,
                        "      {}. {} [{}] {}",
                        index + 1,
                        rule.pattern,
                        rule.linter,
                        Value::Object(rule.rules.clone())
                    )?;
                }
            }
            writeln!(f, "    effective config: {}", action.effective_config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::hook::Decision;

    fn engine() -> LintingRuleEngine {
        LintingRuleEngine::with_linters(default_linters(&ToolLocator::disabled()))
    }

    fn pre_write(path: &str, content: &str) -> PreToolUseMessage {
        PreToolUseMessage {
            tool_name: "Write".to_string(),
            tool_input: json!({"file_path": path, "content": content})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ..PreToolUseMessage::default()
        }
    }

    fn post_write(path: &Path) -> PostToolUseMessage {
        PostToolUseMessage {
            tool_name: "Write".to_string(),
            tool_input: json!({"file_path": path, "content": ""})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ..PostToolUseMessage::default()
        }
    }

    #[tokio::test]
    async fn test_pre_write_blocks_on_errors() {
        let response = engine()
            .evaluate_pre_tool_use(&pre_write("broken.json", "{\"a\": }"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.decision, Some(Decision::Block));
        let reason = response.reason.unwrap();
        assert!(reason.starts_with("Found 1 error(s) in broken.json"));
        assert!(reason.contains("lintgate: broken.json"));
    }

    #[tokio::test]
    async fn test_pre_write_approves_with_warnings() {
        let response = engine()
            .evaluate_pre_tool_use(&pre_write("m.py", "import os\n"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.decision, Some(Decision::Approve));
        assert!(response.message.unwrap().contains("(F401)"));
    }

    #[tokio::test]
    async fn test_pre_tool_use_ignores_other_tools() {
        let msg = PreToolUseMessage {
            tool_name: "Edit".to_string(),
            tool_input: json!({"file_path": "a.py", "old_string": "a", "new_string": "b"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ..PreToolUseMessage::default()
        };
        let response = engine().evaluate_pre_tool_use(&msg).await.unwrap().unwrap();
        assert_eq!(response, HookResponse::approve());

        let unknown = pre_write("notes.txt", "anything at all   ");
        let response = engine().evaluate_pre_tool_use(&unknown).await.unwrap().unwrap();
        assert_eq!(response, HookResponse::approve());
    }

    #[tokio::test]
    async fn test_post_write_reports_findings() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");
        std::fs::write(&file, "# Title\n\ntext \n").unwrap();

        let response = engine()
            .evaluate_post_tool_use(&post_write(&file))
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_blocking());
        assert!(response.reason.unwrap().contains("(trailing-whitespace)"));

        std::fs::write(&file, "# Title\n\ntext\n").unwrap();
        assert!(engine().evaluate_post_tool_use(&post_write(&file)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_write_skips_missing_files_and_tool_errors() {
        let missing = Path::new("/definitely/missing/file.py");
        assert!(engine().evaluate_post_tool_use(&post_write(missing)).await.unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        std::fs::write(&file, "{oops").unwrap();
        let mut msg = post_write(&file);
        msg.tool_error = Some("permission denied".to_string());
        assert!(engine().evaluate_post_tool_use(&msg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_write_lints_sibling_test_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("calc.py");
        let test = dir.path().join("test_calc.py");
        std::fs::write(&source, "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::write(&test, "import os\n\n\ndef test_add():\n    assert True\n").unwrap();

        let mut engine = engine();
        engine
            .set_config(
                serde_json::from_value(json!({
                    "linters": {"python": {"config": {"runTests": false}}}
                }))
                .unwrap(),
            )
            .unwrap();

        let response = engine.evaluate_post_tool_use(&post_write(&source)).await.unwrap().unwrap();
        let reason = response.reason.unwrap();
        assert!(reason.contains(&format!("lintgate: {}", test.display())));
        assert!(!reason.contains(&format!("lintgate: {}\n", source.display())));
    }

    #[tokio::test]
    async fn test_disabled_linter_never_runs() {
        let mut engine = engine();
        engine
            .set_config(
                serde_json::from_value(json!({"linters": {"json": {"enabled": false}}})).unwrap(),
            )
            .unwrap();
        let response = engine
            .evaluate_pre_tool_use(&pre_write("a.json", "{oops"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, HookResponse::approve());
    }

    #[test]
    fn test_effective_overrides_merge_in_order() {
        let mut engine = engine();
        engine
            .set_config(
                serde_json::from_value(json!({"rules": [
                    {
                        "pattern": "*.py",
                        "linter": "python",
                        "rules": {"maxArgs": 6, "maxLineLength": 100}
                    },
                    {"pattern": "test_*.py", "linter": "*", "rules": {"maxArgs": 12}}
                ]}))
                .unwrap(),
            )
            .unwrap();

        let overrides = engine.effective_overrides(Path::new("test_x.py"), "python");
        assert_eq!(overrides.values()["maxArgs"], 12);
        assert_eq!(overrides.values()["maxLineLength"], 100);

        let actions = engine.describe_file(Path::new("test_x.py"));
        assert_eq!(actions.linters.len(), 1);
        let python = &actions.linters[0];
        assert_eq!(python.rules.len(), 2);
        assert_eq!(python.base_config["maxArgs"], 5);
        assert_eq!(python.effective_config["maxArgs"], 12);
        assert!(actions.to_string().contains("linter: python (enabled)"));
    }

    #[test]
    fn test_default_linters_cover_every_language() {
        let engine = engine();
        let cases = [
            ("app.py", "python"),
            ("data.json", "json"),
            ("README.md", "markdown"),
            ("src/lib.rs", "rust"),
            ("main.go", "go"),
            ("web/app.tsx", "javascript"),
            ("api/v1/service.proto", "protobuf"),
        ];
        for (file, linter) in cases {
            let actions = engine.describe_file(Path::new(file));
            let names: Vec<&str> = actions.linters.iter().map(|l| l.name.as_str()).collect();
            assert_eq!(names, [linter], "{file}");
        }
    }

    #[tokio::test]
    async fn test_pre_write_uses_builtin_script_checks() {
        let response = engine()
            .evaluate_pre_tool_use(&pre_write("web/app.js", "function f() {\n  return 1;\n"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.decision, Some(Decision::Approve));
        assert!(response.message.unwrap_or_default().contains("Unclosed '{'"));
    }

    #[test]
    fn test_invalid_linter_config_is_rejected() {
        let mut engine = engine();
        let result = engine.set_config(
            serde_json::from_value(json!({
                "linters": {"markdown": {"config": {"maxLineLength": "wide"}}}
            }))
            .unwrap(),
        );
        assert!(matches!(result, Err(LintError::InvalidConfig { .. })));
    }
}
