//! Installing the hook into agent settings files

use lintgate_core::setup::{HOOK_COMMAND, InitOptions, apply_change, prepare_change, read_settings};
use serde_json::json;

fn lintgate_hooks(settings: &serde_json::Value) -> usize {
    settings["hooks"]["PostToolUse"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|group| group["hooks"].as_array().unwrap())
        .filter(|hook| hook["command"] == HOOK_COMMAND)
        .count()
}

#[test]
fn test_install_creates_missing_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".claude/settings.json");

    let change = prepare_change(&path).unwrap().unwrap();
    assert!(change.original.is_none());
    assert!(change.describe().starts_with("Creating new settings file:"));

    assert_eq!(apply_change(&change).unwrap(), None);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.ends_with('\n'));
    let settings = read_settings(&path).unwrap().unwrap();
    assert_eq!(lintgate_hooks(&settings), 1);
    assert_eq!(settings["hooks"]["PostToolUse"][0]["matcher"], "");
}

#[test]
fn test_install_preserves_existing_settings_and_backs_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let original = json!({
        "model": "sonnet",
        "permissions": {"allow": ["Bash(ls:*)"]},
        "hooks": {
            "PreToolUse": [{"matcher": "Bash", "hooks": [{"type": "command", "command": "audit"}]}],
            "PostToolUse": [{"matcher": "Write", "hooks": [{"type": "command", "command": "fmt"}]}]
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

    let change = prepare_change(&path).unwrap().unwrap();
    assert!(change.describe().starts_with("Modifying 'PostToolUse' hooks:"));

    let backup = apply_change(&change).unwrap().unwrap();
    let backed_up: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(backed_up, original);
    assert!(backup.to_string_lossy().contains("settings.json.backup-"));

    let settings = read_settings(&path).unwrap().unwrap();
    assert_eq!(settings["model"], "sonnet");
    assert_eq!(settings["permissions"], original["permissions"]);
    assert_eq!(settings["hooks"]["PreToolUse"], original["hooks"]["PreToolUse"]);

    let groups = settings["hooks"]["PostToolUse"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0], original["hooks"]["PostToolUse"][0]);
    assert_eq!(lintgate_hooks(&settings), 1);
}

#[test]
fn test_install_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let change = prepare_change(&path).unwrap().unwrap();
    apply_change(&change).unwrap();

    assert!(prepare_change(&path).unwrap().is_none());
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_install_rejects_non_object_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    assert!(prepare_change(&path).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1, 2, 3]");
}

#[test]
fn test_init_targets_follow_scope_flags() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    let both = InitOptions::default().targets(Some(home.path()), project.path()).unwrap();
    assert_eq!(
        both,
        vec![
            home.path().join(".claude/settings.json"),
            project.path().join(".claude/settings.json"),
        ]
    );

    let project_only = InitOptions {
        project_only: true,
        ..InitOptions::default()
    };
    assert_eq!(
        project_only.targets(None, project.path()).unwrap(),
        vec![project.path().join(".claude/settings.json")]
    );

    let global_only = InitOptions {
        global_only: true,
        ..InitOptions::default()
    };
    assert!(global_only.targets(None, project.path()).is_err());
}
