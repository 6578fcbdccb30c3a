//! Shared helpers for integration tests

use std::path::PathBuf;

use lintgate_core::linters::{LintReport, Linter, ToolLocator};
use lintgate_core::rules::{LintingRuleEngine, default_linters};

/// Path of a file under `lintgate-core/testdata`.
pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../lintgate-core/testdata")
        .join(relative)
}

/// Engine whose linters never shell out to external tools.
pub fn offline_engine() -> LintingRuleEngine {
    LintingRuleEngine::with_linters(default_linters(&ToolLocator::disabled()))
}

/// Lints a fixture with `linter` and default configuration.
pub async fn lint_fixture(linter: &dyn Linter, relative: &str) -> LintReport {
    let path = fixture(relative);
    let content = std::fs::read(&path).unwrap();
    linter
        .lint(&path, &content, &Default::default())
        .await
        .unwrap()
}

/// `(line, rule)` pairs of a report.
pub fn findings(report: &LintReport) -> Vec<(usize, String)> {
    report
        .issues
        .iter()
        .map(|i| (i.line, i.rule.clone()))
        .collect()
}
