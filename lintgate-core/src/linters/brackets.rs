//! Bracket balance scan shared by the C-family built-in checks

use std::path::Path;

use super::Issue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    BlockComment,
    Str(char),
}

/// Reports unmatched closing and unclosed opening brackets.
///
/// `//` and `/* */` comments and strings delimited by any of `quotes` are
/// skipped. `"` and `'` strings end at a line break; other quotes may span
/// lines like template literals. Findings are warnings tagged `rule`.
pub(crate) fn unbalanced(path: &Path, source: &str, quotes: &[char], rule: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut open: Vec<(char, usize, usize)> = Vec::new();
    let mut state = State::Code;

    for (idx, text) in source.lines().enumerate() {
        let line = idx + 1;
        let mut chars = text.char_indices().peekable();
        while let Some((col, c)) = chars.next() {
            match state {
                State::BlockComment => {
                    if c == '*' && chars.peek().is_some_and(|&(_, n)| n == '/') {
                        chars.next();
                        state = State::Code;
                    }
                }
                State::Str(quote) => match c {
                    '\\' => {
                        chars.next();
                    }
                    c if c == quote => state = State::Code,
                    _ => {}
                },
                State::Code => match c {
                    '/' if chars.peek().is_some_and(|&(_, n)| n == '/') => break,
                    '/' if chars.peek().is_some_and(|&(_, n)| n == '*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    c if quotes.contains(&c) => state = State::Str(c),
                    '(' | '[' | '{' => open.push((c, line, col + 1)),
                    ')' | ']' | '}' => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        if open.last().is_some_and(|&(o, _, _)| o == expected) {
                            open.pop();
                        } else {
                            issues.push(Issue::warning(
                                path,
                                line,
                                col + 1,
                                format!("Unmatched '{c}'"),
                                rule,
                            ));
                        }
                    }
                    _ => {}
                },
            }
        }
        if matches!(state, State::Str('"' | '\'')) {
            state = State::Code;
        }
    }

    for (c, line, column) in open {
        issues.push(Issue::warning(path, line, column, format!("Unclosed '{c}'"), rule));
    }
    issues.sort_by_key(|i| (i.line, i.column));
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_source_is_clean() {
        let source = "message A {\n  // } stray brace in a comment\n  string b = 1; /* ( */\n}\n";
        assert!(unbalanced(Path::new("a.proto"), source, &['"'], "syntax").is_empty());
    }

    #[test]
    fn test_escaped_quotes_stay_inside_strings() {
        let source = "option x = \"a \\\" {\";\n";
        assert!(unbalanced(Path::new("a.proto"), source, &['"'], "syntax").is_empty());
    }

    #[test]
    fn test_multiline_quotes_only_when_listed() {
        let source = "const s = `\n)\n`;\n";
        assert!(unbalanced(Path::new("a.js"), source, &['`'], "basic-syntax").is_empty());
        let issues = unbalanced(Path::new("a.js"), source, &['"'], "basic-syntax");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 2);
    }
}
