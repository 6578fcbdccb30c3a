use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration::serde_duration;

/// Configuration of the Python linter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PythonConfig {
    pub max_line_length: usize,
    /// Parameter limit for PLR0913
    pub max_args: usize,
    pub disabled_rules: Vec<String>,
    /// Prefer ruff over the built-in checks when it is installed
    pub use_ruff: bool,
    pub ruff_args: Vec<String>,
    pub syntax_check: bool,
    pub run_tests: bool,
    pub test_runner: String,
    pub test_args: Vec<String>,
    #[serde(with = "serde_duration")]
    pub test_timeout: Duration,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            max_line_length: 88,
            max_args: 5,
            disabled_rules: Vec::new(),
            use_ruff: true,
            ruff_args: Vec::new(),
            syntax_check: true,
            run_tests: true,
            test_runner: "pytest".to_string(),
            test_args: vec!["-q".to_string()],
            test_timeout: Duration::from_secs(120),
        }
    }
}

impl PythonConfig {
    pub fn is_rule_enabled(&self, rule: &str) -> bool {
        !self.disabled_rules.iter().any(|r| r.eq_ignore_ascii_case(rule))
    }
}
