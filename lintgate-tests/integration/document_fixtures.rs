//! JSON and Markdown fixtures

use lintgate_core::linters::{JsonLinter, MarkdownLinter, Severity};

use crate::common::{findings, lint_fixture};

#[tokio::test]
async fn test_valid_json_fixture() {
    let report = lint_fixture(&JsonLinter::new(), "json/valid.json").await;
    assert!(report.success);
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn test_invalid_json_fixture() {
    let report = lint_fixture(&JsonLinter::new(), "json/invalid.json").await;
    assert!(!report.success);
    assert_eq!(findings(&report), vec![(3, "syntax".to_string())]);
    assert!(report.issues[0].message.starts_with("Invalid JSON syntax"));
}

#[tokio::test]
async fn test_json_lines_fixture() {
    let report = lint_fixture(&JsonLinter::new(), "json/events.jsonl").await;
    assert_eq!(findings(&report), vec![(3, "syntax".to_string())]);
    assert!(report.issues[0].message.contains("on line 3"));
}

#[tokio::test]
async fn test_valid_markdown_fixture() {
    let report = lint_fixture(&MarkdownLinter::new(), "markdown/valid.md").await;
    assert!(report.issues.is_empty(), "unexpected findings: {:?}", report.issues);
}

#[tokio::test]
async fn test_markdown_issues_fixture() {
    let report = lint_fixture(&MarkdownLinter::new(), "markdown/issues.md").await;
    assert_eq!(
        findings(&report),
        vec![
            (3, "heading-hierarchy".to_string()),
            (5, "trailing-whitespace".to_string()),
            (7, "code-block-language".to_string()),
        ]
    );
    assert_eq!(report.error_count(), 2);
    assert_eq!(report.issues[2].severity, Severity::Warning);
}

mod properties {
    use std::collections::BTreeMap;
    use std::path::Path;

    use lintgate_core::linters::{JsonLinter, LintOverrides, Linter};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_serialized_objects_have_no_errors(
            map in prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..8)
        ) {
            let text = serde_json::to_string(&map).unwrap();
            let report = tokio_test::block_on(JsonLinter::new().lint(
                Path::new("data.json"),
                text.as_bytes(),
                &LintOverrides::default(),
            ))
            .unwrap();
            prop_assert!(report.success);
            prop_assert_eq!(report.error_count(), 0);
        }

        #[test]
        fn test_truncated_objects_are_errors(
            map in prop::collection::btree_map("[a-z]{1,8}", any::<u32>(), 1..8)
        ) {
            let map: BTreeMap<String, u32> = map;
            let mut text = serde_json::to_string(&map).unwrap();
            text.pop();
            let report = tokio_test::block_on(JsonLinter::new().lint(
                Path::new("data.json"),
                text.as_bytes(),
                &LintOverrides::default(),
            ))
            .unwrap();
            prop_assert!(!report.success);
        }
    }
}
