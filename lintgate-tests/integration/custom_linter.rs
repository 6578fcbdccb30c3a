//! Engines built around linters defined outside the core crate

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lintgate_core::hook::{Decision, ExitCode, Executor, parse_hook_response};
use lintgate_core::linters::{Issue, LintError, LintOverrides, LintReport, Linter};
use lintgate_core::rules::LintingRuleEngine;
use serde_json::{Value, json};

/// Flags every line of a `.txt` file that still carries a `TODO`.
struct TodoLinter;

#[async_trait]
impl Linter for TodoLinter {
    fn name(&self) -> &str {
        "todo"
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "txt")
    }

    fn configure(&self, _config: &Value) -> Result<(), LintError> {
        Ok(())
    }

    fn config(&self) -> Value {
        json!({})
    }

    async fn lint(
        &self,
        path: &Path,
        content: &[u8],
        _overrides: &LintOverrides,
    ) -> Result<LintReport, LintError> {
        let issues = String::from_utf8_lossy(content)
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains("TODO"))
            .map(|(i, _)| Issue::error(path, i + 1, 1, "unresolved TODO", "todo"))
            .collect();
        Ok(LintReport::from_issues(issues))
    }
}

/// Always fails, as a linter whose tool crashed would.
struct BrokenLinter;

#[async_trait]
impl Linter for BrokenLinter {
    fn name(&self) -> &str {
        "broken"
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "cfg")
    }

    fn configure(&self, _config: &Value) -> Result<(), LintError> {
        Ok(())
    }

    fn config(&self) -> Value {
        json!({})
    }

    async fn lint(
        &self,
        _path: &Path,
        _content: &[u8],
        _overrides: &LintOverrides,
    ) -> Result<LintReport, LintError> {
        Err(LintError::ToolFailed {
            tool: "cfgcheck".to_string(),
            reason: "exit status 3".to_string(),
        })
    }
}

fn executor() -> Executor {
    let engine =
        LintingRuleEngine::with_linters(vec![Arc::new(TodoLinter), Arc::new(BrokenLinter)]);
    Executor::new(Arc::new(engine))
}

fn pre_write(path: &str, content: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Write",
        "tool_input": {"file_path": path, "content": content}
    }))
    .unwrap()
}

#[test]
fn test_custom_linter_blocks_write() {
    let input = pre_write("notes.txt", "done\nTODO: finish\n");
    let outcome = tokio_test::block_on(executor().execute(&input)).unwrap();

    assert_eq!(outcome.exit_code, ExitCode::Blocking);
    assert!(outcome.stderr.starts_with("Found 1 error(s) in notes.txt"));
    assert!(outcome.stderr.contains("  2:1: unresolved TODO (todo)"));
}

#[test]
fn test_linter_failure_is_reported_but_not_blocking() {
    let input = pre_write("app.cfg", "key = value\n");
    let outcome = tokio_test::block_on(executor().execute(&input)).unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Success);

    let response = parse_hook_response(&outcome.stdout).unwrap();
    assert_eq!(response.decision, Some(Decision::Approve));
    let message = response.message.unwrap();
    assert!(message.contains("linter broken failed: cfgcheck failed: exit status 3"));
    assert!(message.ends_with("⚠️ 1 linter(s) could not run"));
}

#[tokio::test]
async fn test_unhandled_files_are_approved_silently() {
    let outcome = executor().execute(&pre_write("image.png", "")).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Success);

    let response = parse_hook_response(&outcome.stdout).unwrap();
    assert_eq!(response.decision, Some(Decision::Approve));
    assert!(response.message.is_none());
}
