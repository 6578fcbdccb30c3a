//! Feedback text shown to the agent

use std::path::Path;

use crate::linters::{LintReport, LinterFailure};

/// Renders one file's findings and linter failures.
///
/// ```text
/// lintgate: src/app.py
///   3:1: `os` imported but unused (F401)
/// ⚠️ Found 1 warning(s) - consider fixing
/// ```
pub fn format_feedback(path: &Path, report: &LintReport, failures: &[LinterFailure]) -> String {
    let mut out = format!("lintgate: {}\n", path.display());

    for issue in &report.issues {
        out.push_str(&format!("  {}:{}: {}", issue.line, issue.column, issue.message));
        if !issue.rule.is_empty() {
            out.push_str(&format!(" ({})", issue.rule));
        }
        out.push('\n');
    }

    for failure in failures {
        out.push_str(&format!("  linter {} failed: {}\n", failure.linter, failure.error));
    }

    if let Some(output) = report.test_output.as_deref().filter(|o| !o.trim().is_empty()) {
        out.push_str("  test output:\n");
        for line in output.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }

    let errors = report.error_count();
    let warnings = report.warning_count();
    if errors > 0 {
        out.push_str(&format!("❌ Found {errors} blocking issue(s) - fix all above"));
    } else if warnings > 0 {
        out.push_str(&format!("⚠️ Found {warnings} warning(s) - consider fixing"));
    } else if !failures.is_empty() {
        out.push_str(&format!("⚠️ {} linter(s) could not run", failures.len()));
    } else {
        out.push_str("✅ No issues found");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linters::{Issue, LintError};

    #[test]
    fn test_warning_feedback() {
        let path = Path::new("src/app.py");
        let report = LintReport::from_issues(vec![Issue::warning(
            path,
            3,
            1,
            "`os` imported but unused",
            "F401",
        )]);

        assert_eq!(
            format_feedback(path, &report, &[]),
            "lintgate: src/app.py\n  3:1: `os` imported but unused (F401)\n\
             ⚠️ Found 1 warning(s) - consider fixing"
        );
    }

    #[test]
    fn test_errors_take_precedence_in_footer() {
        let path = Path::new("a.md");
        let report = LintReport::from_issues(vec![
            Issue::warning(path, 1, 1, "w", "line-length"),
            Issue::error(path, 2, 5, "e", "trailing-whitespace"),
        ]);
        let text = format_feedback(path, &report, &[]);
        assert!(text.ends_with("❌ Found 1 blocking issue(s) - fix all above"));
        assert!(text.contains("  2:5: e (trailing-whitespace)\n"));
    }

    #[test]
    fn test_failures_and_test_output_are_listed() {
        let path = Path::new("test_calc.py");
        let mut report =
            LintReport::from_issues(vec![Issue::error(path, 1, 1, "Tests failed", "test")]);
        report.test_output = Some("1 failed\nassert 1 == 2".to_string());
        let failures = vec![LinterFailure {
            linter: "rust".to_string(),
            error: LintError::ToolFailed {
                tool: "rustfmt".to_string(),
                reason: "crashed".to_string(),
            },
        }];

        let text = format_feedback(path, &report, &failures);
        assert!(text.contains("  linter rust failed: rustfmt failed: crashed\n"));
        assert!(text.contains("  test output:\n    1 failed\n    assert 1 == 2\n"));
    }
}
