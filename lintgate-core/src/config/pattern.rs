//! Glob patterns for per-file rule overrides
//!
//! Supports `*` (within a path segment), `?` (one character), `**` (any
//! number of segments) and `[...]` character classes.

use std::fmt;
use std::path::Path;

use regex::Regex;

use super::ConfigError;

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` for unbalanced character classes.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches a path given as text, with `\` treated as a separator.
    pub fn matches_str(&self, path: &str) -> bool {
        self.regex.is_match(&path.replace('\\', "/"))
    }

    /// Matches `path` in full, relative to `base` when it lies below it, or
    /// by file name alone.
    pub fn matches_path(&self, path: &Path, base: Option<&Path>) -> bool {
        if self.matches_str(&path.to_string_lossy()) {
            return true;
        }
        if let Some(relative) = base.and_then(|b| path.strip_prefix(b).ok()) {
            if self.matches_str(&relative.to_string_lossy()) {
                return true;
            }
        }
        path.file_name()
            .is_some_and(|name| self.matches_str(&name.to_string_lossy()))
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Convenience for one-off matching; invalid patterns match nothing.
pub fn glob_match(pattern: &str, path: &Path, base: Option<&Path>) -> bool {
    match GlobPattern::new(pattern) {
        Ok(glob) => glob.matches_path(path, base),
        Err(e) => {
            tracing::warn!("Ignoring rule with invalid pattern: {e}");
            false
        }
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                if chars.get(i) == Some(&'/') {
                    i += 1;
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..].iter().position(|c| *c == ']').map(|p| p + i + 1);
                match close {
                    Some(end) if end > i + 1 => {
                        out.push('[');
                        let mut body: String = chars[i + 1..end].iter().collect();
                        if let Some(rest) = body.strip_prefix('!') {
                            body = format!("^{rest}");
                        }
                        out.push_str(&body.replace('\\', "\\\\"));
                        out.push(']');
                        i = end + 1;
                        continue;
                    }
                    _ => out.push_str(r"\["),
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        GlobPattern::new(pattern).unwrap().matches_str(path)
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("*.py", "app.py"));
        assert!(!matches("*.py", "src/app.py"));
        assert!(matches("src/*.py", "src/app.py"));
        assert!(!matches("src/*.py", "src/pkg/app.py"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(matches("**/*.py", "app.py"));
        assert!(matches("**/*.py", "a/b/c/app.py"));
        assert!(matches("tests/**", "tests/unit/test_a.py"));
        assert!(matches("src/**/test_*.py", "src/test_a.py"));
        assert!(matches("src/**/test_*.py", "src/x/y/test_a.py"));
        assert!(!matches("src/**/test_*.py", "lib/test_a.py"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(matches("file?.md", "file1.md"));
        assert!(!matches("file?.md", "file10.md"));
        assert!(matches("[ab].json", "a.json"));
        assert!(!matches("[!ab].json", "a.json"));
        assert!(matches("[!ab].json", "c.json"));
        assert!(matches("a+b(1).txt", "a+b(1).txt"));
    }

    #[test]
    fn test_path_matching_modes() {
        let glob = GlobPattern::new("tests/*.py").unwrap();
        let base = Path::new("/work/project");
        assert!(glob.matches_path(Path::new("/work/project/tests/test_a.py"), Some(base)));
        assert!(!glob.matches_path(Path::new("/elsewhere/tests2/test_a.py"), Some(base)));

        let by_name = GlobPattern::new("test_*.py").unwrap();
        assert!(by_name.matches_path(Path::new("/deep/dir/test_a.py"), None));
    }

    #[test]
    fn test_unclosed_class_is_literal() {
        assert!(matches("a[b", "a[b"));
        assert!(!glob_match("[z-a]", Path::new("q"), None));
    }

    proptest! {
        #[test]
        fn prop_literal_patterns_match_themselves(name in "[a-zA-Z0-9_.+()-]{1,20}") {
            prop_assert!(matches(&name, &name));
        }

        #[test]
        fn prop_star_matches_any_segment(stem in "[a-z0-9_]{0,12}") {
            let file = format!("{stem}.rs");
            prop_assert!(matches("*.rs", &file));
            let deep = format!("a/b/{file}");
            prop_assert!(matches("**/*.rs", &deep));
            let nested = format!("a/{file}");
            prop_assert!(!matches("*.rs", &nested));
        }
    }
}
