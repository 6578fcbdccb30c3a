//! Locating and running external linting tools

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::LintError;

/// Finds executables on a search path, caching every lookup.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Vec<PathBuf>,
    cache: Arc<RwLock<HashMap<String, Option<PathBuf>>>>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ToolLocator {
    /// Locator over the directories in `$PATH`.
    pub fn from_env() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self::with_search_path(search_path)
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Locator that never finds anything, so only built-in checks run.
    pub fn disabled() -> Self {
        Self::with_search_path(Vec::new())
    }

    /// Absolute path of `program`, if it exists on the search path.
    pub fn find(&self, program: &str) -> Option<PathBuf> {
        if let Some(cached) = self.cache.read().get(program) {
            return cached.clone();
        }

        let found = self
            .search_path
            .iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate));

        tracing::trace!(program, found = ?found, "Tool lookup");
        self.cache
            .write()
            .insert(program.to_string(), found.clone());
        found
    }

    pub fn has(&self, program: &str) -> bool {
        self.find(program).is_some()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Runs `program` with optional stdin, capturing its output.
///
/// The child is killed when `timeout` elapses.
///
/// # Errors
/// - `LintError::ToolFailed` - The process could not be spawned
/// - `LintError::Timeout` - The process did not finish in time
/// - `LintError::Io` - Writing stdin or collecting output failed
///
/// Stdin is fed while the output is collected, both under `timeout`. A tool
/// that exits before reading all of its input is not an error.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    stdin: Option<&[u8]>,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<ToolOutput, LintError> {
    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!(tool = %tool, ?args, "Running external tool");

    let mut child = cmd.spawn().map_err(|e| LintError::ToolFailed {
        tool: tool.clone(),
        reason: e.to_string(),
    })?;

    let pipe = child.stdin.take();
    let feed = async move {
        let (Some(input), Some(mut pipe)) = (stdin, pipe) else {
            return Ok(());
        };
        let written = match pipe.write_all(input).await {
            // Tools may exit without reading all of their input
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("Tool closed stdin early");
                Ok(())
            }
            result => result,
        };
        // Closing stdin signals EOF to the tool
        drop(pipe);
        written
    };
    let run = async {
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        output
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(output) => {
            let output = output?;
            Ok(ToolOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            })
        }
        Err(_) => {
            tracing::warn!(tool = %tool, ?timeout, "External tool timed out");
            Err(LintError::Timeout { tool, timeout })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_locator_finds_nothing() {
        let locator = ToolLocator::disabled();
        assert!(locator.find("sh").is_none());
        assert!(!locator.has("ruff"));
    }

    #[cfg(unix)]
    #[test]
    fn test_locator_finds_and_caches_executables() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-linter");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("not-executable"), "").unwrap();

        let locator = ToolLocator::with_search_path(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find("fake-linter"), Some(tool.clone()));
        assert!(locator.find("not-executable").is_none());

        // Cached result survives removal of the file
        std::fs::remove_file(&tool).unwrap();
        assert_eq!(locator.find("fake-linter"), Some(tool));
    }

    #[test]
    fn test_combined_output() {
        let output = ToolOutput {
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(output.combined(), "out\nerr");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_pipes_stdin() {
        let output = run_tool(
            Path::new("/bin/cat"),
            &[],
            Some(b"hello"),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_times_out_while_child_ignores_stdin() {
        let input = vec![b'x'; 1 << 20];
        let started = std::time::Instant::now();
        let result = run_tool(
            Path::new("/bin/sleep"),
            &["3".to_string()],
            Some(&input),
            None,
            Duration::from_millis(200),
        )
        .await;

        assert!(matches!(result, Err(LintError::Timeout { .. })), "got {result:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_keeps_output_when_child_exits_early() {
        let input = vec![b'x'; 1 << 20];
        let output = run_tool(
            Path::new("/bin/sh"),
            &["-c".to_string(), "echo done".to_string()],
            Some(&input),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "done\n");
    }

    #[tokio::test]
    async fn test_run_tool_reports_missing_program() {
        let result = run_tool(
            Path::new("/definitely/not/a/real/tool"),
            &[],
            None,
            None,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(LintError::ToolFailed { .. })));
    }
}
