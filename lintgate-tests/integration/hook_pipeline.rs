//! Hook messages through the executor with the linting engine

use std::path::Path;
use std::sync::Arc;

use lintgate_core::hook::{Decision, ExitCode, Executor, HookError, parse_hook_response};
use lintgate_core::rules::{BlockingRuleEngine, CompositeRuleEngine, RuleEngine};
use serde_json::json;

use crate::common::{fixture, offline_engine};

fn executor() -> Executor {
    let engines: Vec<Arc<dyn RuleEngine>> = vec![
        Arc::new(BlockingRuleEngine::new(["WebFetch"])),
        Arc::new(offline_engine()),
    ];
    Executor::new(Arc::new(CompositeRuleEngine::new(engines)))
}

fn post_write(path: &Path) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "hook_event_name": "PostToolUse",
        "session_id": "session-1",
        "transcript_path": "/tmp/transcript.jsonl",
        "tool_name": "Write",
        "tool_input": {"file_path": path, "content": ""},
        "tool_response": {"success": true}
    }))
    .unwrap()
}

fn copy_fixture(dir: &Path, relative: &str, name: &str) -> std::path::PathBuf {
    let target = dir.join(name);
    std::fs::copy(fixture(relative), &target).unwrap();
    target
}

#[tokio::test]
async fn test_post_write_with_findings_feeds_back_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let file = copy_fixture(dir.path(), "python/lint_errors.py", "lint_errors.py");

    let outcome = executor().execute(&post_write(&file)).await.unwrap();

    assert_eq!(outcome.exit_code, ExitCode::Blocking);
    assert!(outcome.stdout.is_empty());
    assert!(outcome.stderr.starts_with(&format!("lintgate: {}\n", file.display())));
    assert!(outcome.stderr.contains("(F401)"));
    assert!(outcome.stderr.contains("(PLR0913)"));
    assert!(outcome.stderr.ends_with("⚠️ Found 10 warning(s) - consider fixing"));
}

#[tokio::test]
async fn test_post_write_of_clean_file_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let file = copy_fixture(dir.path(), "python/valid.py", "valid.py");

    let outcome = executor().execute(&post_write(&file)).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Success);
    assert!(outcome.stdout.is_empty());
    assert!(outcome.stderr.is_empty());
}

#[tokio::test]
async fn test_post_edit_of_source_reports_sibling_test_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = copy_fixture(dir.path(), "python/valid.py", "calc.py");
    let sibling = copy_fixture(dir.path(), "python/lint_errors.py", "test_calc.py");

    let input = serde_json::to_vec(&json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Edit",
        "tool_input": {"file_path": source, "old_string": "a", "new_string": "b"}
    }))
    .unwrap();

    let outcome = executor().execute(&input).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Blocking);
    assert!(outcome.stderr.starts_with(&format!("lintgate: {}\n", sibling.display())));
}

#[tokio::test]
async fn test_pre_write_blocks_invalid_json() {
    let input = serde_json::to_vec(&json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Write",
        "tool_input": {"file_path": "config/settings.json", "content": "{\"a\": [1, 2,]}"}
    }))
    .unwrap();

    let outcome = executor().execute(&input).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Blocking);
    assert!(outcome.stderr.starts_with("Found 1 error(s) in config/settings.json"));
}

#[tokio::test]
async fn test_pre_write_with_warnings_is_approved() {
    let content = std::fs::read_to_string(fixture("python/lint_errors.py")).unwrap();
    let input = serde_json::to_vec(&json!({
        "hook_event_name": "PreToolUse",
        "tool_name": "Write",
        "tool_input": {"file_path": "pkg/lint_errors.py", "content": content}
    }))
    .unwrap();

    let outcome = executor().execute(&input).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Success);

    let response = parse_hook_response(&outcome.stdout).unwrap();
    assert_eq!(response.decision, Some(Decision::Approve));
    assert!(response.message.unwrap().contains("(E711)"));
}

#[tokio::test]
async fn test_policy_block_wins_over_linting() {
    let input = br#"{"hook_event_name":"PreToolUse","tool_name":"WebFetch",
        "tool_input":{"url":"https://example.com"}}"#;
    let outcome = executor().execute(input).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Blocking);
    assert_eq!(outcome.stderr, "Tool WebFetch is blocked by policy");
}

#[tokio::test]
async fn test_non_tool_events_pass_through() {
    let input = br#"{"hook_event_name":"Stop","session_id":"s","reason":"done"}"#;
    let outcome = executor().execute(input).await.unwrap();
    assert_eq!(outcome.exit_code, ExitCode::Success);
    assert!(outcome.stdout.is_empty());
}

#[tokio::test]
async fn test_malformed_input_is_an_error() {
    assert!(matches!(
        executor().execute(b"{\"tool_name\": \"Write\"}").await,
        Err(HookError::Parse { .. })
    ));
    assert!(matches!(
        executor().execute(br#"{"hook_event_name":"Bogus"}"#).await,
        Err(HookError::UnknownEvent { .. })
    ));
}
