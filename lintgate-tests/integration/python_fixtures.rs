//! Python fixtures through the built-in checks

use std::path::Path;

use lintgate_core::linters::python::{PythonLinter, is_test_file};
use lintgate_core::linters::{Linter, Severity, ToolLocator};

use crate::common::{findings, fixture, lint_fixture};

fn offline_python() -> PythonLinter {
    PythonLinter::with_tools(ToolLocator::disabled())
}

#[tokio::test]
async fn test_valid_module_is_clean() {
    let report = lint_fixture(&offline_python(), "python/valid.py").await;
    assert!(report.success);
    assert!(report.issues.is_empty(), "unexpected findings: {:?}", report.issues);
}

#[tokio::test]
async fn test_lint_errors_cover_every_defect_class() {
    let report = lint_fixture(&offline_python(), "python/lint_errors.py").await;

    let rules: Vec<&str> = report.issues.iter().map(|i| i.rule.as_str()).collect();
    for expected in ["F401", "E711", "E712", "B006", "N801", "N802", "E501", "PLR0913"] {
        assert!(rules.contains(&expected), "missing {expected} in {rules:?}");
    }

    // Style findings never block on their own
    assert!(report.success);
    assert!(report.issues.iter().all(|i| i.severity == Severity::Warning));
}

#[tokio::test]
async fn test_lint_errors_positions() {
    let report = lint_fixture(&offline_python(), "python/lint_errors.py").await;
    assert_eq!(
        findings(&report),
        vec![
            (3, "F401".to_string()),
            (4, "F401".to_string()),
            (11, "E712".to_string()),
            (16, "N801".to_string()),
            (22, "N802".to_string()),
            (23, "A001".to_string()),
            (28, "E501".to_string()),
            (29, "PLR0913".to_string()),
            (46, "E711".to_string()),
            (55, "B006".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_test_module_is_clean_and_recognised() {
    let path = fixture("python/test_example.py");
    assert!(is_test_file(&path));

    // Without a test runner on the search path only static checks run
    let report = lint_fixture(&offline_python(), "python/test_example.py").await;
    assert!(report.success);
    assert!(report.issues.is_empty(), "unexpected findings: {:?}", report.issues);
    assert!(report.test_output.is_none());
}

#[tokio::test]
async fn test_disabled_rules_and_stricter_limits() {
    let linter = offline_python();
    linter
        .configure(&serde_json::json!({"disabledRules": ["f401", "E501"], "maxArgs": 2}))
        .unwrap();

    let report = lint_fixture(&linter, "python/lint_errors.py").await;
    let rules: Vec<&str> = report.issues.iter().map(|i| i.rule.as_str()).collect();
    assert!(!rules.contains(&"F401"));
    assert!(!rules.contains(&"E501"));
    // badly_named_function now exceeds the limit as well
    assert_eq!(rules.iter().filter(|r| **r == "PLR0913").count(), 2);
}

#[tokio::test]
async fn test_syntax_error_reported_alone() {
    let linter = offline_python();
    let report = linter
        .lint(
            Path::new("broken.py"),
            b"def broken(:\n    return 1\n",
            &Default::default(),
        )
        .await
        .unwrap();
    assert!(!report.success);
    assert_eq!(findings(&report), vec![(1, "syntax".to_string())]);
}
