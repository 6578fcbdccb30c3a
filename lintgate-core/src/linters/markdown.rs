//! Markdown linter

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Issue, LintError, LintOverrides, LintReport, Linter, decode_config, extension};

const NAME: &str = "markdown";

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:\s|$)").expect("valid heading pattern"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(?:[-*+]|\d+[.)])\s").expect("valid list item pattern"));
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").expect("valid fence pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkdownConfig {
    pub max_line_length: usize,
    pub max_blank_lines: usize,
    pub list_indent_size: usize,
    pub require_frontmatter: bool,
    pub disabled_rules: Vec<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            max_line_length: 120,
            max_blank_lines: 2,
            list_indent_size: 2,
            require_frontmatter: false,
            disabled_rules: Vec::new(),
        }
    }
}

pub struct MarkdownLinter {
    config: RwLock<MarkdownConfig>,
}

impl Default for MarkdownLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownLinter {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(MarkdownConfig::default()),
        }
    }
}

/// Open fenced code block.
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|c| *c == self.marker).count();
        run >= self.len && run == trimmed.chars().count()
    }
}

/// Number of lines taken by a leading `---` front matter block.
fn frontmatter_lines(lines: &[&str]) -> Option<usize> {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return None;
    }
    lines
        .iter()
        .skip(1)
        .position(|l| matches!(l.trim_end(), "---" | "..."))
        .map(|end| end + 2)
}

fn check_content(path: &Path, text: &str, config: &MarkdownConfig) -> Vec<Issue> {
    let lines: Vec<&str> = text.lines().collect();
    let mut issues = Vec::new();

    let body_start = match frontmatter_lines(&lines) {
        Some(count) => count,
        None => {
            if config.require_frontmatter {
                issues.push(Issue::error(
                    path,
                    1,
                    1,
                    "Front matter is required but not present",
                    "require-frontmatter",
                ));
            }
            0
        }
    };

    let indent_size = config.list_indent_size.max(1);
    let mut fence: Option<Fence> = None;
    let mut seen_h1 = false;
    let mut last_level = 0;
    let mut blank_run = 0;

    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;

        let content_len = line.trim_end_matches([' ', '\t']).chars().count();
        if content_len < line.chars().count() {
            issues.push(Issue::error(
                path,
                line_no,
                content_len + 1,
                "Line has trailing whitespace",
                "trailing-whitespace",
            ));
        }

        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > config.max_blank_lines {
                issues.push(Issue::warning(
                    path,
                    line_no,
                    1,
                    format!("More than {} consecutive blank lines", config.max_blank_lines),
                    "blank-line-spacing",
                ));
            }
            continue;
        }
        blank_run = 0;

        if index < body_start {
            continue;
        }

        if let Some(open) = &fence {
            if open.closes(line) {
                fence = None;
            }
            continue;
        }

        if let Some(caps) = FENCE_RE.captures(line) {
            let marker = &caps[1];
            let info = caps[2].trim();
            if info.is_empty() {
                issues.push(Issue::warning(
                    path,
                    line_no,
                    1,
                    "Code blocks should specify a language for syntax highlighting",
                    "code-block-language",
                ));
            }
            fence = Some(Fence {
                marker: marker.chars().next().unwrap_or('`'),
                len: marker.len(),
            });
            continue;
        }

        let length = line.chars().count();
        if length > config.max_line_length {
            issues.push(Issue::warning(
                path,
                line_no,
                config.max_line_length + 1,
                format!(
                    "Line exceeds maximum length of {} characters ({length})",
                    config.max_line_length
                ),
                "line-length",
            ));
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            let level = caps[1].len();
            if level == 1 {
                if seen_h1 {
                    issues.push(Issue::warning(
                        path,
                        line_no,
                        1,
                        "Multiple H1 headings found, consider using H2 for subsequent sections",
                        "heading-hierarchy",
                    ));
                }
                seen_h1 = true;
            }
            if last_level > 0 && level > last_level + 1 {
                issues.push(Issue::error(
                    path,
                    line_no,
                    1,
                    format!(
                        "Heading level {level} skips level {} (should not skip levels)",
                        last_level + 1
                    ),
                    "heading-hierarchy",
                ));
            }
            last_level = level;
            continue;
        }

        if let Some(caps) = LIST_ITEM_RE.captures(line) {
            let indent = caps[1].chars().count();
            if indent % indent_size != 0 {
                issues.push(Issue::warning(
                    path,
                    line_no,
                    1,
                    format!("List items should use {indent_size}-space indentation for nesting"),
                    "list-indentation",
                ));
            }
        }
    }

    issues.retain(|issue| !config.disabled_rules.contains(&issue.rule));
    issues
}

#[async_trait]
impl Linter for MarkdownLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        matches!(extension(path).as_deref(), Some("md" | "markdown"))
    }

    fn configure(&self, config: &Value) -> Result<(), LintError> {
        *self.config.write() = decode_config(NAME, config)?;
        Ok(())
    }

    fn config(&self) -> Value {
        serde_json::to_value(&*self.config.read()).unwrap_or(Value::Null)
    }

    async fn lint(
        &self,
        path: &Path,
        content: &[u8],
        overrides: &LintOverrides,
    ) -> Result<LintReport, LintError> {
        let config = overrides.resolve(NAME, &*self.config.read())?;
        let text = String::from_utf8_lossy(content);
        Ok(LintReport::from_issues(check_content(path, &text, &config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(text: &str) -> Vec<(usize, String)> {
        check_content(Path::new("doc.md"), text, &MarkdownConfig::default())
            .into_iter()
            .map(|i| (i.line, i.rule))
            .collect()
    }

    #[test]
    fn test_clean_document() {
        let doc = "# Title\n\nSome text.\n\n## Section\n\n- item\n  - nested\n\n\
                   ```rust\nfn main() {}\n```\n";
        assert!(rules(doc).is_empty());
    }

    #[test]
    fn test_heading_hierarchy() {
        let issues = rules("# One\n\n### Three\n\n# Again\n");
        assert_eq!(
            issues,
            vec![
                (3, "heading-hierarchy".to_string()),
                (5, "heading-hierarchy".to_string())
            ]
        );

        let report =
            check_content(Path::new("d.md"), "# One\n### Three\n", &MarkdownConfig::default());
        assert_eq!(report[0].severity, crate::linters::Severity::Error);
    }

    #[test]
    fn test_code_blocks_are_not_linted_as_markdown() {
        let doc = "# Title\n\n```\n# not a heading\n### nor this\n   - odd list\n```\n";
        assert_eq!(rules(doc), vec![(3, "code-block-language".to_string())]);
    }

    #[test]
    fn test_line_rules() {
        let long = format!("# T\n\n{}\n", "x".repeat(130));
        assert_eq!(rules(&long), vec![(3, "line-length".to_string())]);
        assert_eq!(rules("# T\ntext \n"), vec![(2, "trailing-whitespace".to_string())]);
        assert_eq!(
            rules("# T\n\n\n\nmore\n"),
            vec![(4, "blank-line-spacing".to_string())]
        );
        assert_eq!(rules("# T\n\n   - odd\n"), vec![(3, "list-indentation".to_string())]);
    }

    #[test]
    fn test_frontmatter() {
        let config = MarkdownConfig {
            require_frontmatter: true,
            ..MarkdownConfig::default()
        };
        let missing = check_content(Path::new("d.md"), "# T\n", &config);
        assert_eq!(missing[0].rule, "require-frontmatter");

        let present = check_content(Path::new("d.md"), "---\ntitle: x\n---\n# T\n", &config);
        assert!(present.is_empty());
    }

    #[test]
    fn test_disabled_rules() {
        let config = MarkdownConfig {
            disabled_rules: vec!["trailing-whitespace".to_string()],
            ..MarkdownConfig::default()
        };
        assert!(check_content(Path::new("d.md"), "text \n", &config).is_empty());
    }
}
