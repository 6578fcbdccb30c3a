//! Built-in Python checks
//!
//! A line-oriented approximation of the most common ruff rules, used when
//! ruff is not installed. String literals and comments are blanked out
//! before any pattern is applied, so their text never produces findings.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::config::PythonConfig;
use crate::linters::Issue;

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^import\s+(.+)$").expect("valid import pattern"));
static FROM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from\s+(\S+)\s+import\s+(.+)$").expect("valid from-import pattern")
});
static DEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").expect("valid def pattern")
});
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)").expect("valid class pattern"));
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*(?::[^=]*)?=(?:[^=]|$)").expect("valid assignment pattern")
});
static NONE_CMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([=!]=)\s*None\b|\bNone\s*([=!]=)").expect("valid None comparison pattern")
});
static BOOL_CMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[=!]=\s*(True|False)\b|\b(True|False)\s*[=!]=")
        .expect("valid bool comparison pattern")
});
static ALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__all__\s*(?::[^=]*)?\+?=\s*[\[(]([^\])]*)").expect("valid __all__ pattern")
});
static QUOTED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([A-Za-z_]\w*)["']"#).expect("valid quoted name pattern")
});

const BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes", "callable",
    "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate",
    "eval", "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr",
    "hash", "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "set", "setattr", "slice", "sorted",
    "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Method names required by unittest and friends.
const CAMEL_CASE_METHODS: &[&str] = &[
    "setUp", "tearDown", "setUpClass", "tearDownClass", "setUpModule", "tearDownModule",
    "asyncSetUp", "asyncTearDown", "setUpTestData", "failureException", "longMessage", "maxDiff",
];

/// Source text with string contents and comments replaced by spaces.
///
/// Every character maps to exactly one character of the input, so line
/// and column positions carry over.
#[derive(Debug)]
pub(crate) struct MaskedSource {
    pub text: String,
    /// Start of a string literal that never closes
    pub unterminated_string: Option<(usize, usize)>,
}

pub(crate) fn mask_source(source: &str) -> MaskedSource {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut unterminated_at: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            '\'' | '"' => {
                let start = out.len();
                let is_fstring = string_prefix(&chars, i).contains('f');
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                let delim = if triple { 3 } else { 1 };
                for _ in 0..delim {
                    out.push(c);
                }
                i += delim;

                let closed = mask_string_body(&chars, &mut i, &mut out, c, triple, is_fstring);
                if !closed && unterminated_at.is_none() {
                    unterminated_at = Some(start);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    let unterminated_string = unterminated_at.map(|offset| position_of(&out, offset));
    MaskedSource {
        text: out,
        unterminated_string,
    }
}

/// Consumes a string body up to and including its closing delimiter.
/// Returns false when the string does not terminate.
fn mask_string_body(
    chars: &[char],
    i: &mut usize,
    out: &mut String,
    quote: char,
    triple: bool,
    is_fstring: bool,
) -> bool {
    let delim = if triple { 3 } else { 1 };
    let mut field_depth = 0usize;

    while *i < chars.len() {
        let ch = chars[*i];

        if field_depth > 0 {
            // Replacement fields of f-strings stay visible as code
            if ch == quote && !triple {
                field_depth = 0;
            } else if ch == '\n' && !triple {
                return false;
            } else {
                match ch {
                    '{' => field_depth += 1,
                    '}' => field_depth -= 1,
                    _ => {}
                }
                out.push(ch);
                *i += 1;
                continue;
            }
        }

        if ch == '\\' {
            out.push(' ');
            *i += 1;
            if let Some(&next) = chars.get(*i) {
                out.push(if next == '\n' { '\n' } else { ' ' });
                *i += 1;
            }
            continue;
        }

        let closes = ch == quote
            && (!triple
                || (chars.get(*i + 1) == Some(&quote) && chars.get(*i + 2) == Some(&quote)));
        if closes {
            for _ in 0..delim {
                out.push(quote);
            }
            *i += delim;
            return true;
        }

        if ch == '\n' {
            if !triple {
                return false;
            }
            out.push('\n');
            *i += 1;
            continue;
        }

        if is_fstring && ch == '{' {
            if chars.get(*i + 1) == Some(&'{') {
                out.push_str("  ");
                *i += 2;
            } else {
                field_depth = 1;
                out.push('{');
                *i += 1;
            }
            continue;
        }

        out.push(' ');
        *i += 1;
    }
    false
}

/// Lower-cased prefix letters (`f`, `rb`, ...) directly before a quote.
fn string_prefix(chars: &[char], quote_index: usize) -> String {
    let mut start = quote_index;
    while start > 0 && quote_index - start < 3 && chars[start - 1].is_ascii_alphabetic() {
        start -= 1;
    }
    let prefix: String = chars[start..quote_index].iter().collect();
    let preceded_by_ident =
        start > 0 && (chars[start - 1].is_alphanumeric() || chars[start - 1] == '_');
    if preceded_by_ident || !prefix.chars().all(|c| "rRbBuUfF".contains(c)) {
        return String::new();
    }
    prefix.to_ascii_lowercase()
}

/// 1-based line and column of a byte offset.
fn position_of(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

/// A statement spanning one or more physical lines.
#[derive(Debug)]
struct LogicalLine {
    /// Index of the first physical line
    first: usize,
    /// Index of the last physical line
    last: usize,
    indent: usize,
    text: String,
}

fn logical_lines(masked: &[&str]) -> Vec<LogicalLine> {
    let mut result = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut depth: i32 = 0;

    for (index, line) in masked.iter().enumerate() {
        let trimmed = line.trim();
        if current.is_none() && trimmed.is_empty() {
            continue;
        }

        for c in line.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }

        let logical = current.get_or_insert_with(|| LogicalLine {
            first: index,
            last: index,
            indent: line.len() - line.trim_start().len(),
            text: String::new(),
        });
        if !logical.text.is_empty() {
            logical.text.push(' ');
        }
        logical.text.push_str(trimmed.trim_end_matches('\\').trim_end());
        logical.last = index;

        let continues = depth > 0 || trimmed.ends_with('\\');
        if !continues {
            result.extend(current.take());
        }
    }
    result.extend(current);
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Class,
    Function,
}

/// Name bound by an import statement.
struct ImportedName {
    name: String,
    line: usize,
    column: usize,
}

/// Runs every built-in check over `source`.
///
/// Findings are sorted by line, column and rule. Disabled rules are dropped.
pub(crate) fn check_source(path: &Path, source: &str, config: &PythonConfig) -> Vec<Issue> {
    let masked = mask_source(source);
    let raw_lines: Vec<&str> = source.lines().collect();
    let masked_lines: Vec<&str> = masked.text.lines().collect();

    let mut issues = Vec::new();
    let mut imports = Vec::new();
    let mut import_lines = HashSet::new();
    let mut blocks: Vec<(usize, Block)> = Vec::new();

    for logical in logical_lines(&masked_lines) {
        while blocks.last().is_some_and(|(indent, _)| *indent >= logical.indent) {
            blocks.pop();
        }
        let in_class = blocks.last().is_some_and(|(_, b)| *b == Block::Class);
        let first_line = masked_lines.get(logical.first).copied().unwrap_or_default();

        if let Some(names) = parse_import(&logical.text) {
            import_lines.extend(logical.first..=logical.last);
            for name in names {
                let column = find_word(first_line, &name).unwrap_or(logical.indent + 1);
                imports.push(ImportedName {
                    name,
                    line: logical.first + 1,
                    column,
                });
            }
        } else if let Some(caps) = CLASS_RE.captures(&logical.text) {
            let name = &caps[1];
            if !is_cap_words(name) {
                let column = find_word(first_line, name).unwrap_or(logical.indent + 1);
                issues.push(Issue::warning(
                    path,
                    logical.first + 1,
                    column,
                    format!("Class name `{name}` should use CapWords convention"),
                    "N801",
                ));
            }
            blocks.push((logical.indent, Block::Class));
        } else if let Some(caps) = DEF_RE.captures(&logical.text) {
            let open = caps.get(0).map_or(0, |m| m.end());
            check_function(
                path,
                &caps[1],
                &logical,
                &logical.text[open..],
                &masked_lines,
                config,
                &mut issues,
            );
            blocks.push((logical.indent, Block::Function));
        } else if !in_class {
            if let Some(caps) = ASSIGN_RE.captures(&logical.text) {
                let name = &caps[1];
                if BUILTINS.contains(&name) {
                    issues.push(Issue::warning(
                        path,
                        logical.first + 1,
                        logical.indent + 1,
                        format!("Variable `{name}` is shadowing a Python builtin"),
                        "A001",
                    ));
                }
            }
        }
    }

    check_unused_imports(path, source, &masked_lines, &import_lines, imports, &mut issues);

    for (index, line) in masked_lines.iter().enumerate() {
        check_comparisons(path, index + 1, line, &mut issues);
    }

    for (index, raw) in raw_lines.iter().enumerate() {
        let raw = raw.trim_end_matches('\r');
        let length = raw.chars().count();
        if length > config.max_line_length {
            issues.push(Issue::warning(
                path,
                index + 1,
                config.max_line_length + 1,
                format!("Line too long ({length} > {})", config.max_line_length),
                "E501",
            ));
        }
        let content_len = raw.trim_end_matches([' ', '\t']).chars().count();
        if content_len < length {
            issues.push(Issue::warning(
                path,
                index + 1,
                content_len + 1,
                "Trailing whitespace",
                "W291",
            ));
        }
    }

    issues.retain(|issue| config.is_rule_enabled(&issue.rule));
    issues.sort_by(|a, b| (a.line, a.column, &a.rule).cmp(&(b.line, b.column, &b.rule)));
    issues
}

/// Names bound by an import statement, or `None` if `text` is not one.
fn parse_import(text: &str) -> Option<Vec<String>> {
    if let Some(caps) = FROM_IMPORT_RE.captures(text) {
        if &caps[1] == "__future__" {
            return Some(Vec::new());
        }
        let names = caps[2]
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != "*")
            .map(|n| bound_name(n, false))
            .collect();
        return Some(names);
    }

    IMPORT_RE.captures(text).map(|caps| {
        caps[1]
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| bound_name(n, true))
            .collect()
    })
}

/// `a.b as c` binds `c`; a plain `import a.b` binds `a`.
fn bound_name(clause: &str, dotted: bool) -> String {
    let mut parts = clause.split_whitespace();
    let target = parts.next().unwrap_or_default();
    match (parts.next(), parts.next()) {
        (Some("as"), Some(alias)) => alias.to_string(),
        _ if dotted => target.split('.').next().unwrap_or(target).to_string(),
        _ => target.to_string(),
    }
}

fn check_unused_imports(
    path: &Path,
    source: &str,
    masked_lines: &[&str],
    import_lines: &HashSet<usize>,
    imports: Vec<ImportedName>,
    issues: &mut Vec<Issue>,
) {
    if imports.is_empty() {
        return;
    }

    let code: String = masked_lines
        .iter()
        .enumerate()
        .filter(|(index, _)| !import_lines.contains(index))
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");

    let exported: HashSet<String> = ALL_RE
        .captures_iter(source)
        .flat_map(|caps| {
            QUOTED_NAME_RE
                .captures_iter(caps.get(1).map_or("", |m| m.as_str()))
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>()
        })
        .collect();

    for import in imports {
        if exported.contains(&import.name) {
            continue;
        }
        let used = Regex::new(&format!(r"\b{}\b", regex::escape(&import.name)))
            .map(|re| re.is_match(&code))
            .unwrap_or(true);
        if !used {
            issues.push(Issue::warning(
                path,
                import.line,
                import.column,
                format!("`{}` imported but unused", import.name),
                "F401",
            ));
        }
    }
}

fn check_comparisons(path: &Path, line_no: usize, line: &str, issues: &mut Vec<Issue>) {
    for caps in NONE_CMP_RE.captures_iter(line) {
        let op = caps.get(1).or_else(|| caps.get(2));
        let start = caps.get(0).map_or(0, |m| m.start());
        let negated = op.is_some_and(|m| m.as_str() == "!=");
        let suggestion = if negated { "cond is not None" } else { "cond is None" };
        issues.push(Issue::warning(
            path,
            line_no,
            char_column(line, start),
            format!("Comparison to `None` should be `{suggestion}`"),
            "E711",
        ));
    }

    for caps in BOOL_CMP_RE.captures_iter(line) {
        let value = caps.get(1).or_else(|| caps.get(2)).map_or("True", |m| m.as_str());
        let start = caps.get(0).map_or(0, |m| m.start());
        let hint = if value == "True" {
            "use `if cond:` for truth checks"
        } else {
            "use `if not cond:` for false checks"
        };
        issues.push(Issue::warning(
            path,
            line_no,
            char_column(line, start),
            format!("Avoid equality comparisons to `{value}`; {hint}"),
            "E712",
        ));
    }
}

fn check_function(
    path: &Path,
    name: &str,
    logical: &LogicalLine,
    after_paren: &str,
    masked_lines: &[&str],
    config: &PythonConfig,
    issues: &mut Vec<Issue>,
) {
    let line = logical.first + 1;
    let first_line = masked_lines.get(logical.first).copied().unwrap_or_default();

    let is_dunder = name.len() > 4 && name.starts_with("__") && name.ends_with("__");
    if !is_dunder && !CAMEL_CASE_METHODS.contains(&name) && name.to_lowercase() != name {
        let column = find_word(first_line, name).unwrap_or(logical.indent + 1);
        issues.push(Issue::warning(
            path,
            line,
            column,
            format!("Function name `{name}` should be lowercase"),
            "N802",
        ));
    }

    let params = split_top_level(closing_paren_prefix(after_paren));
    let mut counted = 0;
    for param in &params {
        let (target, default) = split_default(param);
        let target = target.split(':').next().unwrap_or_default().trim();

        if target.starts_with('*') || target == "/" || target.is_empty() {
            continue;
        }
        if target != "self" && target != "cls" {
            counted += 1;
        }

        if let Some(default) = default {
            if is_mutable_literal(default) {
                let (line, column) = locate_default(logical, masked_lines, target, default);
                issues.push(Issue::warning(
                    path,
                    line,
                    column,
                    "Do not use mutable data structures for argument defaults",
                    "B006",
                ));
            }
        }
    }

    if counted > config.max_args {
        let column = find_word(first_line, name).unwrap_or(logical.indent + 1);
        issues.push(Issue::warning(
            path,
            line,
            column,
            format!(
                "Too many arguments in function definition ({counted} > {})",
                config.max_args
            ),
            "PLR0913",
        ));
    }
}

/// Text up to the `)` that closes an already-open parenthesis.
fn closing_paren_prefix(text: &str) -> &str {
    let mut depth = 1;
    for (index, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[..index];
                }
            }
            _ => {}
        }
    }
    text
}

/// Splits on commas that are not nested in brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Splits `name: T = default` at its top-level assignment.
fn split_default(param: &str) -> (&str, Option<&str>) {
    let bytes = param.as_bytes();
    let mut depth = 0;
    for (index, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = index.checked_sub(1).map(|i| bytes[i]);
                let next = bytes.get(index + 1).copied();
                if !matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) && next != Some(b'=') {
                    return (&param[..index], Some(param[index + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    (param, None)
}

fn is_mutable_literal(default: &str) -> bool {
    default.starts_with('[')
        || default.starts_with('{')
        || ["list(", "dict(", "set("]
            .iter()
            .any(|call| default.starts_with(call))
}

/// Physical position of a parameter default, falling back to the def line.
fn locate_default(
    logical: &LogicalLine,
    masked_lines: &[&str],
    target: &str,
    default: &str,
) -> (usize, usize) {
    for index in logical.first..=logical.last {
        let Some(line) = masked_lines.get(index) else {
            break;
        };
        if let Some(name_at) = find_word(line, target) {
            let after_name: String = line.chars().skip(name_at - 1).collect();
            if let Some(offset) = after_name.find(default) {
                let column = name_at + after_name[..offset].chars().count();
                return (index + 1, column);
            }
        }
    }
    (logical.first + 1, logical.indent + 1)
}

fn is_cap_words(name: &str) -> bool {
    let stripped = name.trim_start_matches('_');
    stripped
        .chars()
        .next()
        .is_none_or(|c| c.is_uppercase())
        && !stripped.contains('_')
}

/// 1-based column of `word` as a whole identifier in `line`.
fn find_word(line: &str, word: &str) -> Option<usize> {
    let re = Regex::new(&format!(r"\b{}\b", regex::escape(word))).ok()?;
    re.find(line).map(|m| char_column(line, m.start()))
}

fn char_column(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset].chars().count() + 1
}

/// Bracket and string balance scan used when no Python interpreter exists.
///
/// Returns the position and message of the first problem found.
pub(crate) fn scan_syntax(source: &str) -> Option<(usize, usize, String)> {
    let masked = mask_source(source);
    if let Some((line, column)) = masked.unterminated_string {
        return Some((line, column, "unterminated string literal".to_string()));
    }

    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    for (line_index, line) in masked.text.lines().enumerate() {
        for (col_index, c) in line.chars().enumerate() {
            let position = (line_index + 1, col_index + 1);
            match c {
                '(' | '[' | '{' => stack.push((c, position.0, position.1)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _, _)) if open == expected => {}
                        Some((open, _, _)) => {
                            return Some((
                                position.0,
                                position.1,
                                format!(
                                    "closing parenthesis '{c}' does not match \
                                     opening parenthesis '{open}'"
                                ),
                            ));
                        }
                        None => {
                            return Some((position.0, position.1, format!("unmatched '{c}'")));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    stack
        .first()
        .map(|(open, line, column)| (*line, *column, format!("'{open}' was never closed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(source: &str) -> Vec<String> {
        check_source(Path::new("sample.py"), source, &PythonConfig::default())
            .into_iter()
            .map(|issue| issue.rule)
            .collect()
    }

    #[test]
    fn test_mask_blanks_strings_and_comments() {
        let masked = mask_source("x = \"None\"  # == None\ny = 'a'\n");
        assert_eq!(masked.text, "x = \"    \"           \ny = ' '\n");
        assert!(masked.unterminated_string.is_none());
    }

    #[test]
    fn test_mask_keeps_fstring_fields_visible() {
        let masked = mask_source("print(f\"{name}: {{x}}\")");
        assert_eq!(masked.text, "print(f\"{name}       \")");
    }

    #[test]
    fn test_mask_handles_triple_quotes_and_escapes() {
        let source = "s = \"\"\"line one\nline \"two\"\n\"\"\"\nt = 'it\\'s'\n";
        let masked = mask_source(source);
        assert_eq!(masked.text.lines().count(), source.lines().count());
        assert!(!masked.text.contains("two"));
        assert!(masked.text.ends_with("t = '     '\n"));
    }

    #[test]
    fn test_unterminated_string_position() {
        let masked = mask_source("a = 1\nb = 'oops\n");
        assert_eq!(masked.unterminated_string, Some((2, 5)));
    }

    #[test]
    fn test_unused_imports() {
        let source = "import os\nimport sys as system\n\
                      from typing import (\n    Any,\n    Dict,\n)\n\nx: Any = os.getcwd()\n";
        let issues = check_source(Path::new("m.py"), source, &PythonConfig::default());
        let unused: Vec<_> = issues
            .iter()
            .filter(|i| i.rule == "F401")
            .map(|i| (i.message.as_str(), i.line))
            .collect();
        assert_eq!(
            unused,
            vec![("`system` imported but unused", 2), ("`Dict` imported but unused", 3)]
        );
    }

    #[test]
    fn test_imports_used_only_in_strings_are_unused() {
        let source = "import json\nprint(\"json\")  # json\n";
        assert_eq!(rules(source), vec!["F401"]);
    }

    #[test]
    fn test_dunder_all_and_future_imports_count_as_used() {
        let source =
            "from __future__ import annotations\nfrom .core import run\n__all__ = [\"run\"]\n";
        assert!(rules(source).is_empty());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(rules("if x == None:\n    pass\n"), vec!["E711"]);
        assert_eq!(rules("if None != x:\n    pass\n"), vec!["E711"]);
        assert_eq!(rules("if x == True:\n    pass\n"), vec!["E712"]);
        assert_eq!(rules("if x != False:\n    pass\n"), vec!["E712"]);
        assert!(rules("if x is None:\n    pass\n").is_empty());
        assert!(rules("def f(x=None, y=True):\n    pass\n").is_empty());
    }

    #[test]
    fn test_naming_rules() {
        assert_eq!(rules("class bad_name:\n    pass\n"), vec!["N801"]);
        assert!(rules("class _Private:\n    pass\n").is_empty());
        assert_eq!(rules("def CamelCase():\n    pass\n"), vec!["N802"]);
        let methods = "class Thing:\n    def __init__(self):\n        pass\n\n\
                       \x20   def setUp(self):\n        pass\n";
        assert!(rules(methods).is_empty());
    }

    #[test]
    fn test_mutable_defaults() {
        assert_eq!(rules("def f(items=[]):\n    pass\n"), vec!["B006"]);
        assert_eq!(rules("def f(m: dict = {}):\n    pass\n"), vec!["B006"]);
        assert_eq!(rules("def f(s=set()):\n    pass\n"), vec!["B006"]);
        assert!(rules("def f(t=(), n=None):\n    pass\n").is_empty());

        let issues = check_source(
            Path::new("m.py"),
            "def f(a, items=[]):\n    pass\n",
            &PythonConfig::default(),
        );
        assert_eq!((issues[0].line, issues[0].column), (1, 16));
    }

    #[test]
    fn test_too_many_arguments() {
        let multi_line = "def f(\n    a, b, c,\n    d, e, g,\n):\n    pass\n";
        assert_eq!(rules(multi_line), vec!["PLR0913"]);

        let with_self =
            "class K:\n    def m(self, a, b, c, d, e, *args, **kwargs):\n        pass\n";
        assert!(rules(with_self).is_empty());
    }

    #[test]
    fn test_line_rules() {
        let long = format!("x = 1  # {}\n", "a".repeat(90));
        assert_eq!(rules(&long), vec!["E501"]);
        assert_eq!(rules("x = 1   \n"), vec!["W291"]);
    }

    #[test]
    fn test_builtin_shadowing() {
        assert_eq!(rules("list = [1, 2]\n"), vec!["A001"]);
        assert_eq!(rules("def f():\n    id = 3\n    return id\n"), vec!["A001"]);
        // Class attributes and comparisons are not assignments
        assert!(rules("class C:\n    id = 3\n").is_empty());
        assert!(rules("print(type == 3)\n").is_empty());
    }

    #[test]
    fn test_disabled_rules_and_line_length() {
        let config = PythonConfig {
            disabled_rules: vec!["E711".to_string()],
            max_line_length: 10,
            ..PythonConfig::default()
        };
        let issues = check_source(Path::new("m.py"), "if value == None:\n    pass\n", &config);
        let rules: Vec<_> = issues.iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec!["E501"]);
    }

    #[test]
    fn test_scan_syntax() {
        assert!(scan_syntax("def f(a, b):\n    return [a, {b: 1}]\n").is_none());
        assert_eq!(
            scan_syntax("x = (1, 2\ny = 3\n"),
            Some((1, 5, "'(' was never closed".to_string()))
        );
        assert_eq!(
            scan_syntax("x = 1)\n"),
            Some((1, 6, "unmatched ')'".to_string()))
        );
        assert!(scan_syntax("s = \")(\"\n").is_none());
        assert!(scan_syntax("s = 'open\n").is_some());
    }
}
