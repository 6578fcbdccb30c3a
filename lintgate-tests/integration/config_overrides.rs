//! Layered configuration files driving the linting engine

use std::path::Path;

use lintgate_core::config::{ConfigError, ConfigLoader};
use lintgate_core::linters::LintError;

use crate::common::{findings, fixture, offline_engine};

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn rules_of(findings: &[(usize, String)]) -> Vec<&str> {
    findings.iter().map(|(_, rule)| rule.as_str()).collect()
}

#[test]
fn test_files_layer_from_home_to_local() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    write(
        &home.path().join(".claude/lintgate.json"),
        r#"{"blockedTools": ["WebFetch"], "timeout": "30s",
            "linters": {"python": {"config": {"maxLineLength": 100}}}}"#,
    );
    write(
        &project.path().join(".claude/lintgate.json"),
        r#"{"linters": {"markdown": {"enabled": false}},
            "rules": [{"pattern": "legacy/**", "linter": "python", "rules": {"maxArgs": 10}}]}"#,
    );
    write(
        &project.path().join(".claude/lintgate.local.json"),
        r#"{"blockedTools": ["WebFetch", "Bash"], "parallel": {"disableParallel": true}}"#,
    );

    let loader =
        ConfigLoader::with_dirs(Some(home.path().to_path_buf()), project.path().to_path_buf());
    assert!(loader.config_exists());

    let config = loader.load_files().unwrap();
    assert_eq!(config.blocked_tools, vec!["WebFetch", "Bash"]);
    assert_eq!(config.timeout, Some(std::time::Duration::from_secs(30)));
    assert!(!config.is_linter_enabled("markdown"));
    assert!(config.is_linter_enabled("python"));
    assert_eq!(config.linter_config("python").unwrap()["maxLineLength"], 100);
    assert_eq!(config.rules.len(), 1);
    assert_eq!(config.max_workers(), 1);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let project = tempfile::tempdir().unwrap();
    let loader = ConfigLoader::with_dirs(None, project.path().to_path_buf())
        .with_explicit(project.path().join("missing.json"));

    assert!(!loader.config_exists());
    assert!(matches!(loader.load_files(), Err(ConfigError::Read { .. })));
}

#[test]
fn test_malformed_file_names_its_path() {
    let project = tempfile::tempdir().unwrap();
    let file = project.path().join(".claude/lintgate.json");
    write(&file, "{\"linters\": ");

    let loader = ConfigLoader::with_dirs(None, project.path().to_path_buf());
    match loader.load_files() {
        Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disabled_linter_is_skipped() {
    let project = tempfile::tempdir().unwrap();
    write(
        &project.path().join(".claude/lintgate.json"),
        r#"{"linters": {"markdown": {"enabled": false}}}"#,
    );
    let config = ConfigLoader::with_dirs(None, project.path().to_path_buf())
        .load_files()
        .unwrap();

    let mut engine = offline_engine();
    engine.set_config(config).unwrap();

    let content = std::fs::read(fixture("markdown/issues.md")).unwrap();
    let (report, failures) = engine.lint_content(Path::new("docs/issues.md"), &content).await;
    assert!(!report.has_issues());
    assert!(failures.is_empty());
    assert!(engine.linters_for(Path::new("docs/issues.md")).is_empty());
}

#[tokio::test]
async fn test_rule_overrides_apply_only_to_matching_paths() {
    let config = lintgate_core::config::GateConfig::from_json(
        Path::new("inline.json"),
        r#"{"rules": [
            {
                "pattern": "legacy/**",
                "linter": "python",
                "rules": {"disabledRules": ["F401", "E501"]}
            },
            {"pattern": "legacy/**", "linter": "*", "rules": {"maxArgs": 10}}
        ]}"#,
    )
    .unwrap();

    let mut engine = offline_engine();
    engine.set_config(config).unwrap();

    let content = std::fs::read(fixture("python/lint_errors.py")).unwrap();

    let (strict, _) = engine.lint_content(Path::new("src/lint_errors.py"), &content).await;
    let strict = findings(&strict);
    assert!(rules_of(&strict).contains(&"F401"));
    assert!(rules_of(&strict).contains(&"PLR0913"));

    let (relaxed, _) = engine.lint_content(Path::new("legacy/lint_errors.py"), &content).await;
    let relaxed = findings(&relaxed);
    let relaxed_rules = rules_of(&relaxed);
    assert!(!relaxed_rules.contains(&"F401"));
    assert!(!relaxed_rules.contains(&"E501"));
    assert!(!relaxed_rules.contains(&"PLR0913"));
    assert!(relaxed_rules.contains(&"E712"));
    assert_eq!(relaxed.len(), strict.len() - 4);

    // Overrides never leak into the base configuration.
    let (again, _) = engine.lint_content(Path::new("src/lint_errors.py"), &content).await;
    assert_eq!(findings(&again), strict);

    let actions = engine.describe_file(Path::new("legacy/lint_errors.py"));
    let python = actions.linters.iter().find(|a| a.name == "python").unwrap();
    assert_eq!(python.rules.len(), 2);
    assert_eq!(python.effective_config["maxArgs"], 10);
}

#[test]
fn test_invalid_linter_config_is_rejected() {
    let config = lintgate_core::config::GateConfig::from_json(
        Path::new("inline.json"),
        r#"{"linters": {"python": {"config": {"maxArgs": "many"}}}}"#,
    )
    .unwrap();

    let mut engine = offline_engine();
    assert!(matches!(
        engine.set_config(config),
        Err(LintError::InvalidConfig { linter, .. }) if linter == "python"
    ));
}
