//! Go linter
//!
//! gofmt checks the content itself. golangci-lint, `go vet` and `go test`
//! compile the package from disk and only run once the content is written.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::process::{ToolLocator, run_tool};
use super::{
    Issue, LintError, LintOverrides, LintReport, Linter, Severity, decode_config, extension,
    matches_disk,
};

const NAME: &str = "go";
const GOFMT_TIMEOUT: Duration = Duration::from_secs(30);

static VET_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:vet: )?(.+?\.go):(\d+):(\d+): (.+)$").expect("valid vet line pattern")
});

static GOFMT_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<standard input>:(\d+):(\d+): (.+)$").expect("valid gofmt error pattern")
});

static TEST_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+(Test\w*)\s*\(\s*\w+\s+\*testing\.T\s*\)")
        .expect("valid test function pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoConfig {
    pub gofmt: bool,
    pub golangci_lint: bool,
    pub vet: bool,
    pub run_tests: bool,
    /// Limit for golangci-lint and `go vet`
    #[serde(with = "crate::config::duration::serde_duration")]
    pub tool_timeout: Duration,
    #[serde(with = "crate::config::duration::serde_duration")]
    pub test_timeout: Duration,
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            gofmt: true,
            golangci_lint: true,
            vet: false,
            run_tests: true,
            tool_timeout: Duration::from_secs(60),
            test_timeout: Duration::from_secs(120),
        }
    }
}

/// True for Go test files (`*_test.go`).
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_test.go"))
}

/// `pkg/foo.go` -> `pkg/foo_test.go`.
pub fn sibling_test_file(path: &Path) -> Option<PathBuf> {
    if is_test_file(path) || extension(path).as_deref() != Some("go") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(path.with_file_name(format!("{stem}_test.go")))
}

/// Generated sources and `testdata` fixtures are never linted.
fn is_exempt(path: &Path, content: &[u8]) -> bool {
    if path.components().any(|c| c.as_os_str() == "testdata") {
        return true;
    }
    content
        .windows(b"// Code generated".len())
        .any(|w| w == b"// Code generated")
}

/// Directory of the closest `go.mod` above `path`.
fn find_module_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|dir| dir.join("go.mod").is_file())
        .map(Path::to_path_buf)
}

/// Names of `func TestX(t *testing.T)` declarations, in source order.
fn test_functions(source: &str) -> Vec<String> {
    TEST_FUNC_RE
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn common_prefix(names: &[String]) -> &str {
    let Some((first, rest)) = names.split_first() else {
        return "";
    };
    let mut len = first.len();
    for name in rest {
        len = first
            .bytes()
            .zip(name.bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count();
    }
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    &first[..len]
}

/// `-run` pattern selecting the tests declared in one file.
fn test_pattern(path: &Path, source: &str) -> String {
    let names = test_functions(source);
    match names.as_slice() {
        [] => {
            let base = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix("_test.go"))
                .unwrap_or_default();
            let mut chars = base.chars();
            let capitalized: String = chars
                .next()
                .map(|c| c.to_ascii_uppercase())
                .into_iter()
                .chain(chars)
                .collect();
            format!("^Test{capitalized}")
        }
        [single] => format!("^{single}$"),
        _ => {
            let prefix = common_prefix(&names);
            // "Test" alone would select the whole package
            if prefix.len() > 4 {
                format!("^{prefix}")
            } else {
                format!("^({})$", names.join("|"))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GolangciOutput {
    #[serde(rename = "Issues", default)]
    issues: Option<Vec<GolangciIssue>>,
}

#[derive(Debug, Deserialize)]
struct GolangciIssue {
    #[serde(rename = "FromLinter")]
    from_linter: String,
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "Severity", default)]
    severity: String,
    #[serde(rename = "Pos")]
    pos: GolangciPos,
}

#[derive(Debug, Deserialize)]
struct GolangciPos {
    #[serde(rename = "Filename")]
    filename: String,
    #[serde(rename = "Line")]
    line: usize,
    #[serde(rename = "Column", default)]
    column: usize,
}

/// Issues from golangci-lint's JSON report that point at `path`.
fn parse_golangci_output(path: &Path, root: &Path, stdout: &str) -> Vec<Issue> {
    let Ok(output) = serde_json::from_str::<GolangciOutput>(stdout) else {
        tracing::debug!("Unreadable golangci-lint output");
        return Vec::new();
    };
    output
        .issues
        .unwrap_or_default()
        .into_iter()
        .filter(|issue| {
            let reported = Path::new(&issue.pos.filename);
            reported == path || root.join(reported) == path
        })
        .map(|issue| {
            let severity = if issue.severity == "error" {
                Severity::Error
            } else {
                Severity::Warning
            };
            Issue::new(
                path,
                issue.pos.line,
                issue.pos.column.max(1),
                severity,
                issue.text,
                issue.from_linter,
            )
        })
        .collect()
}

/// Converts `file:line:col: message` lines naming `path` into warnings.
fn parse_vet_output(path: &Path, output: &str) -> Vec<Issue> {
    let Some(name) = path.file_name() else {
        return Vec::new();
    };
    output
        .lines()
        .filter_map(|line| VET_LINE_RE.captures(line.trim()))
        .filter(|caps| Path::new(&caps[1]).file_name() == Some(name))
        .filter_map(|caps| {
            let line = caps[2].parse().ok()?;
            let column = caps[3].parse().ok()?;
            Some(Issue::warning(path, line, column, &caps[4], "vet"))
        })
        .collect()
}

fn parse_gofmt_error(path: &Path, stderr: &str) -> Issue {
    let first = stderr.lines().next().unwrap_or_default().trim();
    match GOFMT_ERROR_RE.captures(first) {
        Some(caps) => Issue::error(
            path,
            caps[1].parse().unwrap_or(1),
            caps[2].parse().unwrap_or(1),
            format!("Go syntax error: {}", &caps[3]),
            "syntax",
        ),
        None => Issue::error(path, 1, 1, format!("Go syntax error: {first}"), "syntax"),
    }
}

enum Gofmt {
    Clean,
    Reformatted(String),
    SyntaxError(Issue),
}

pub struct GoLinter {
    config: RwLock<GoConfig>,
    tools: ToolLocator,
}

impl Default for GoLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl GoLinter {
    pub fn new() -> Self {
        Self::with_tools(ToolLocator::from_env())
    }

    pub fn with_tools(tools: ToolLocator) -> Self {
        Self {
            config: RwLock::new(GoConfig::default()),
            tools,
        }
    }

    async fn gofmt(&self, path: &Path, content: &[u8]) -> Result<Gofmt, LintError> {
        let Some(gofmt) = self.tools.find("gofmt") else {
            return Ok(Gofmt::Clean);
        };
        let output = run_tool(&gofmt, &[], Some(content), None, GOFMT_TIMEOUT).await?;
        if !output.success() {
            return Ok(Gofmt::SyntaxError(parse_gofmt_error(path, &output.stderr)));
        }
        if output.stdout.as_bytes() == content {
            Ok(Gofmt::Clean)
        } else {
            Ok(Gofmt::Reformatted(output.stdout))
        }
    }

    async fn golangci_lint(
        &self,
        path: &Path,
        config: &GoConfig,
    ) -> Result<Vec<Issue>, LintError> {
        let Some(golangci) = self.tools.find("golangci-lint") else {
            return Ok(Vec::new());
        };
        let Some(root) = find_module_root(path) else {
            tracing::debug!(file = %path.display(), "No go.mod above file, skipping linters");
            return Ok(Vec::new());
        };

        let mut args = vec![
            "run".to_string(),
            "--fast".to_string(),
            "--out-format=json".to_string(),
        ];
        let golangci_config = root.join(".golangci.yml");
        if golangci_config.is_file() {
            args.push(format!("--config={}", golangci_config.display()));
        }
        args.push(path.display().to_string());

        let output = run_tool(&golangci, &args, None, Some(&root), config.tool_timeout).await?;
        Ok(parse_golangci_output(path, &root, &output.stdout))
    }

    async fn vet(&self, path: &Path, config: &GoConfig) -> Result<Vec<Issue>, LintError> {
        let Some(go) = self.tools.find("go") else {
            return Ok(Vec::new());
        };
        let Some(dir) = path.parent().filter(|d| d.is_dir()) else {
            return Ok(Vec::new());
        };
        let args = vec!["vet".to_string(), ".".to_string()];
        let output = run_tool(&go, &args, None, Some(dir), config.tool_timeout).await?;
        Ok(parse_vet_output(path, &output.stderr))
    }

    /// Runs the tests declared in the test file `path` with `go test`.
    async fn run_tests(
        &self,
        path: &Path,
        content: &[u8],
        config: &GoConfig,
    ) -> Result<LintReport, LintError> {
        let Some(go) = self.tools.find("go") else {
            tracing::debug!("go not found, skipping tests");
            return Ok(LintReport::clean());
        };
        let Some(root) = find_module_root(path) else {
            tracing::debug!(file = %path.display(), "No go.mod above file, skipping tests");
            return Ok(LintReport::clean());
        };
        let package = path
            .parent()
            .and_then(|dir| dir.strip_prefix(&root).ok())
            .map(|rel| {
                let rel = rel.to_string_lossy().replace('\\', "/");
                if rel.is_empty() {
                    ".".to_string()
                } else {
                    format!("./{rel}")
                }
            })
            .unwrap_or_else(|| "./...".to_string());

        let pattern = test_pattern(path, &String::from_utf8_lossy(content));
        let args = vec![
            "test".to_string(),
            "-v".to_string(),
            "-run".to_string(),
            pattern,
            package,
        ];

        let output = match run_tool(&go, &args, None, Some(&root), config.test_timeout).await {
            Ok(output) => output,
            Err(LintError::Timeout { timeout, .. }) => {
                return Ok(LintReport::from_issues(vec![Issue::error(
                    path,
                    1,
                    1,
                    format!("Tests timed out after {timeout:?}"),
                    "test",
                )]));
            }
            Err(e) => return Err(e),
        };

        let mut report = if output.success() {
            LintReport::clean()
        } else {
            let exit = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            LintReport::from_issues(vec![Issue::error(
                path,
                1,
                1,
                format!("Tests failed: go test exited with {exit}"),
                "test",
            )])
        };
        report.test_output = Some(output.combined());
        Ok(report)
    }
}

#[async_trait]
impl Linter for GoLinter {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension(path).as_deref() == Some("go")
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
        if is_exempt(path, content) {
            tracing::debug!(file = %path.display(), "Skipping generated or testdata file");
            return Ok(LintReport::clean());
        }

        let config = overrides.resolve(NAME, &*self.config.read())?;
        let mut report = LintReport::clean();

        if config.gofmt {
            match self.gofmt(path, content).await? {
                Gofmt::Clean => {}
                Gofmt::Reformatted(formatted) => {
                    report.push(Issue::warning(path, 1, 1, "File is not gofmt-ed", "gofmt"));
                    report.formatted = Some(formatted);
                }
                Gofmt::SyntaxError(issue) => return Ok(LintReport::from_issues(vec![issue])),
            }
        }

        let wants_package_tools =
            config.golangci_lint || config.vet || (config.run_tests && is_test_file(path));
        if !wants_package_tools {
            return Ok(report);
        }
        if !matches_disk(path, content).await {
            tracing::debug!(file = %path.display(), "Content not on disk yet, skipping go tools");
            return Ok(report);
        }

        if config.golangci_lint {
            report.extend(self.golangci_lint(path, &config).await?);
        }
        if config.vet {
            report.extend(self.vet(path, &config).await?);
        }
        if config.run_tests && is_test_file(path) {
            let tests = self.run_tests(path, content, &config).await?;
            report.extend(tests.issues);
            report.test_output = tests.test_output;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_go_test_files() {
        assert!(is_test_file(Path::new("pkg/calc_test.go")));
        assert!(!is_test_file(Path::new("pkg/calc.go")));
        assert_eq!(
            sibling_test_file(Path::new("pkg/calc.go")),
            Some(PathBuf::from("pkg/calc_test.go"))
        );
        assert_eq!(sibling_test_file(Path::new("pkg/calc_test.go")), None);
        assert_eq!(sibling_test_file(Path::new("pkg/calc.py")), None);
    }

    #[test]
    fn test_parse_vet_output() {
        let stderr = "# example.com/pkg\n\
                      vet: ./calc.go:12:2: unreachable code\n\
                      ./other.go:3:1: self-assignment of x to x\n\
                      ./calc.go:20:9: fmt.Printf format %d has arg s of wrong type string\n";
        let issues = parse_vet_output(Path::new("/src/pkg/calc.go"), stderr);
        assert_eq!(issues.len(), 2);
        assert_eq!((issues[0].line, issues[0].column), (12, 2));
        assert_eq!(issues[0].message, "unreachable code");
        assert_eq!(issues[1].rule, "vet");
    }

    #[test]
    fn test_extract_test_functions() {
        let source = "package calc\n\nimport \"testing\"\n\n\
                      func TestValid(t *testing.T) {}\n\
                      func helper() {}\n\
                      func BenchmarkAdd(b *testing.B) {}\n\
                      func TestWrongType(t *testing.B) {}\n\
                      func TestNoParam() {}\n\
                      func TestTooMany(t *testing.T, x int) {}\n\
                      func TestWithSubtests(t *testing.T) {\n\
                      \tt.Run(\"sub\", func(t *testing.T) {})\n\
                      }\n";
        assert_eq!(test_functions(source), ["TestValid", "TestWithSubtests"]);
        assert!(test_functions("package calc\n").is_empty());
    }

    #[test]
    fn test_common_prefix() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(common_prefix(&names(&[])), "");
        assert_eq!(common_prefix(&names(&["TestOnly"])), "TestOnly");
        assert_eq!(
            common_prefix(&names(&["TestDatabase_Open", "TestDatabase_Close"])),
            "TestDatabase_"
        );
        assert_eq!(common_prefix(&names(&["TestAPI", "TestHandler"])), "Test");
    }

    #[test]
    fn test_test_pattern_selection() {
        let file = Path::new("pkg/api_test.go");
        let one = "func TestAPI_Create(t *testing.T) {}\n";
        assert_eq!(test_pattern(file, one), "^TestAPI_Create$");

        let shared = "func TestDB_Open(t *testing.T) {}\nfunc TestDB_Close(t *testing.T) {}\n";
        assert_eq!(test_pattern(file, shared), "^TestDB_");

        let mixed = "func TestAPI_Create(t *testing.T) {}\n\
                     func TestHandler_Init(t *testing.T) {}\n";
        assert_eq!(test_pattern(file, mixed), "^(TestAPI_Create|TestHandler_Init)$");

        assert_eq!(test_pattern(file, "package pkg\n"), "^TestApi");
    }

    #[test]
    fn test_generated_and_testdata_files_are_exempt() {
        let generated = b"// Code generated by protoc-gen-go. DO NOT EDIT.\npackage pb\n";
        assert!(is_exempt(Path::new("pb/api.pb.go"), generated));
        assert!(is_exempt(Path::new("pkg/testdata/bad.go"), b"package bad\n"));
        assert!(!is_exempt(Path::new("pkg/calc.go"), b"package calc\n"));
    }

    #[test]
    fn test_parse_gofmt_error() {
        let issue = parse_gofmt_error(
            Path::new("main.go"),
            "<standard input>:3:14: expected '(', found '{'\n",
        );
        assert_eq!((issue.line, issue.column), (3, 14));
        assert_eq!(issue.rule, "syntax");
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.message, "Go syntax error: expected '(', found '{'");
    }

    #[test]
    fn test_parse_golangci_output() {
        let root = Path::new("/work/mod");
        let target = root.join("pkg/calc.go");
        let stdout = r#"{"Issues":[
            {"FromLinter":"errcheck","Text":"Error return value is not checked","Severity":"",
             "Pos":{"Filename":"pkg/calc.go","Line":7,"Column":2}},
            {"FromLinter":"typecheck","Text":"undefined: x","Severity":"error",
             "Pos":{"Filename":"pkg/calc.go","Line":9,"Column":5}},
            {"FromLinter":"unused","Text":"func helper is unused","Severity":"",
             "Pos":{"Filename":"pkg/other.go","Line":1,"Column":6}}
        ]}"#;
        let issues = parse_golangci_output(&target, root, stdout);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].rule, "errcheck");
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[1].severity, Severity::Error);

        assert!(parse_golangci_output(&target, root, r#"{"Issues":null}"#).is_empty());
    }

    #[tokio::test]
    async fn test_missing_tools_report_nothing() {
        let linter = GoLinter::with_tools(ToolLocator::disabled());
        linter.configure(&json!({"vet": true})).unwrap();
        let report = linter
            .lint(Path::new("main.go"), b"package main\n", &LintOverrides::default())
            .await
            .unwrap();
        assert!(report.issues.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tests_are_reported_for_written_test_files() {
        let bin = tempfile::tempdir().unwrap();
        crate::linters::testing::fake_tool(
            bin.path(),
            "go",
            "echo \"$@\" > \"$(dirname \"$0\")/args\"\necho '--- FAIL: TestAdd (0.00s)'\nexit 1",
        );

        let module = tempfile::tempdir().unwrap();
        std::fs::write(module.path().join("go.mod"), "module example.com/calc\n").unwrap();
        std::fs::create_dir_all(module.path().join("calc")).unwrap();
        let file = module.path().join("calc/add_test.go");
        let source = b"package calc\n\nimport \"testing\"\n\nfunc TestAdd(t *testing.T) {}\n";
        std::fs::write(&file, source).unwrap();

        let tools = ToolLocator::with_search_path(vec![bin.path().to_path_buf()]);
        let linter = GoLinter::with_tools(tools);
        linter.configure(&json!({"gofmt": false, "golangciLint": false})).unwrap();

        let pending = linter
            .lint(&file, b"package calc\n", &LintOverrides::default())
            .await
            .unwrap();
        assert!(pending.issues.is_empty());
        assert!(pending.test_output.is_none());

        let report = linter.lint(&file, source, &LintOverrides::default()).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.issues[0].rule, "test");
        assert!(report.issues[0].message.starts_with("Tests failed"));
        assert!(report.test_output.unwrap().contains("--- FAIL: TestAdd"));

        let args = std::fs::read_to_string(bin.path().join("args")).unwrap();
        assert_eq!(args.trim(), "test -v -run ^TestAdd$ ./calc");
    }
}
