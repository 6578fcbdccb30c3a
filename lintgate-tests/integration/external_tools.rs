//! External tools driven through stand-in executables

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lintgate_core::hook::{Decision, PostToolUseMessage};
use lintgate_core::linters::{LintError, LintOverrides, Linter, RustLinter, ToolLocator, run_tool};
use lintgate_core::rules::{LintingRuleEngine, RuleEngine, default_linters};
use serde_json::json;

use crate::common::offline_engine;

/// Writes an executable shell script named `name` into `dir`.
#[cfg(unix)]
fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let tool = dir.join(name);
    std::fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    tool
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

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_applies_while_stdin_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let sleeper = fake_tool(dir.path(), "stall", "sleep 5");
    let input = vec![b'{'; 4 << 20];

    let started = Instant::now();
    let result = run_tool(&sleeper, &[], Some(&input), None, Duration::from_millis(300)).await;

    assert!(matches!(result, Err(LintError::Timeout { .. })), "got {result:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[cfg(unix)]
#[tokio::test]
async fn test_tool_output_survives_unread_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let quick = fake_tool(dir.path(), "quick", "echo '{\"ok\": true}'");
    let input = vec![b' '; 4 << 20];

    let output = run_tool(&quick, &[], Some(&input), None, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(output.success());
    assert_eq!(output.stdout.trim(), r#"{"ok": true}"#);
}

#[cfg(unix)]
#[tokio::test]
async fn test_clippy_findings_for_workspace_member() {
    let workspace = tempfile::tempdir().unwrap();
    write(
        &workspace.path().join("Cargo.toml"),
        "[workspace]\nmembers = [\"crates/engine\"]\n",
    );
    write(
        &workspace.path().join("crates/engine/Cargo.toml"),
        "[package]\nname = \"engine\"\n",
    );
    let file = workspace.path().join("crates/engine/src/lib.rs");
    write(&file, "pub fn spin() {\n    loop {}\n}\n");

    // cargo reports spans relative to the workspace root, not the member
    let message = json!({
        "reason": "compiler-message",
        "message": {
            "message": "empty `loop {}` wastes CPU cycles",
            "level": "warning",
            "code": {"code": "clippy::empty_loop"},
            "spans": [{
                "file_name": "crates/engine/src/lib.rs",
                "line_start": 2,
                "column_start": 5,
                "is_primary": true
            }]
        }
    });
    let bin = tempfile::tempdir().unwrap();
    fake_tool(bin.path(), "cargo", &format!("echo '{message}'"));
    let tools = ToolLocator::with_search_path(vec![bin.path().to_path_buf()]);

    let linter = RustLinter::with_tools(tools.clone());
    linter.configure(&json!({"rustfmt": false, "clippy": true})).unwrap();
    let content = std::fs::read(&file).unwrap();
    let report = linter
        .lint(&file, &content, &LintOverrides::default())
        .await
        .unwrap();
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].rule, "clippy::empty_loop");
    assert_eq!((report.issues[0].line, report.issues[0].column), (2, 5));

    let mut engine = LintingRuleEngine::with_linters(default_linters(&tools));
    engine
        .set_config(
            serde_json::from_value(json!({
                "linters": {"rust": {"config": {"rustfmt": false, "clippy": true}}}
            }))
            .unwrap(),
        )
        .unwrap();
    let response = engine
        .evaluate_post_tool_use(&post_write(&file))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.decision, Some(Decision::Block));
    assert!(response.reason.unwrap().contains("2:5: empty `loop {}` wastes CPU cycles"));
}

#[tokio::test]
async fn test_pretty_printed_json_keeps_author_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("package.json");
    let text = r#"{
  "name": "web",
  "version": "1.0.0",
  "dependencies": {
    "zod": "3",
    "axios": "1"
  }
}
"#;
    write(&file, text);

    let mut engine = offline_engine();
    engine
        .set_config(
            serde_json::from_value(json!({"linters": {"json": {"config": {"prettyPrint": true}}}}))
                .unwrap(),
        )
        .unwrap();

    assert!(engine.evaluate_post_tool_use(&post_write(&file)).await.unwrap().is_none());

    let (report, _) = engine
        .lint_content(&file, br#"{"name":"web","version":"1.0.0"}"#)
        .await;
    assert_eq!(
        report.formatted.as_deref(),
        Some("{\n  \"name\": \"web\",\n  \"version\": \"1.0.0\"\n}\n")
    );
}
