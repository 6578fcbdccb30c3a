//! Bounded concurrent execution of linters over one file

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{LintError, LintOverrides, LintReport, Linter};

/// Result of one linter run, tagged with the linter's name.
#[derive(Debug)]
pub struct LintTaskResult {
    pub linter_name: String,
    pub result: Result<LintReport, LintError>,
}

/// A linter that failed to run, as opposed to reporting findings.
#[derive(Debug)]
pub struct LinterFailure {
    pub linter: String,
    pub error: LintError,
}

/// Runs tasks with at most `max_workers` in flight.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    max_workers: usize,
    semaphore: Arc<Semaphore>,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ParallelExecutor {
    /// Creates an executor; `0` selects the number of CPUs.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = if max_workers == 0 {
            num_cpus::get().max(1)
        } else {
            max_workers
        };
        Self {
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs every task and returns their outputs in submission order.
    ///
    /// A task that panics is reported through `on_panic`.
    pub async fn execute_tasks<F, T>(
        &self,
        tasks: Vec<F>,
        on_panic: impl Fn(usize) -> T,
    ) -> Vec<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let count = tasks.len();
        let mut set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            set.spawn(async move {
                // The semaphore is never closed, so acquisition only waits
                let _permit = semaphore.acquire_owned().await.ok();
                (index, task.await)
            });
        }

        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, output)) => slots[index] = Some(output),
                Err(e) => tracing::error!("Lint task failed to complete: {e}"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| on_panic(index)))
            .collect()
    }

    /// Lints `content` with each linter concurrently.
    ///
    /// `overrides_for` supplies the per-file overrides for a linter name.
    /// Results come back in the order of `linters`.
    pub async fn execute_linters<O>(
        &self,
        linters: &[Arc<dyn Linter>],
        path: &Path,
        content: &[u8],
        overrides_for: O,
    ) -> Vec<LintTaskResult>
    where
        O: Fn(&str) -> LintOverrides,
    {
        let content: Arc<[u8]> = Arc::from(content);
        let path: Arc<PathBuf> = Arc::new(path.to_path_buf());

        let tasks: Vec<_> = linters
            .iter()
            .map(|linter| {
                let linter = Arc::clone(linter);
                let content = Arc::clone(&content);
                let path = Arc::clone(&path);
                let overrides = overrides_for(linter.name());
                async move {
                    let result = linter.lint(&path, &content, &overrides).await;
                    LintTaskResult {
                        linter_name: linter.name().to_string(),
                        result,
                    }
                }
            })
            .collect();

        let names: Vec<String> = linters.iter().map(|l| l.name().to_string()).collect();
        self.execute_tasks(tasks, |index| LintTaskResult {
            linter_name: names[index].clone(),
            result: Err(LintError::ToolFailed {
                tool: names[index].clone(),
                reason: "lint task panicked".to_string(),
            }),
        })
        .await
    }
}

/// Merges per-linter results into one report plus the list of failures.
///
/// Issues are concatenated, success is the conjunction of all reports, the
/// first formatted content wins and test output is joined.
pub fn aggregate_results(results: Vec<LintTaskResult>) -> (LintReport, Vec<LinterFailure>) {
    let mut report = LintReport::clean();
    let mut failures = Vec::new();
    let mut test_outputs = Vec::new();

    for task in results {
        match task.result {
            Ok(result) => {
                report.success &= result.success;
                report.issues.extend(result.issues);
                if report.formatted.is_none() {
                    report.formatted = result.formatted;
                }
                if let Some(output) = result.test_output {
                    test_outputs.push(output);
                }
            }
            Err(error) => {
                tracing::warn!(linter = %task.linter_name, "Linter failed: {error}");
                failures.push(LinterFailure {
                    linter: task.linter_name,
                    error,
                });
            }
        }
    }

    if !test_outputs.is_empty() {
        report.test_output = Some(test_outputs.join("\n"));
    }
    (report, failures)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::linters::Issue;

    struct FixedLinter {
        name: &'static str,
        report: LintReport,
        delay: Duration,
    }

    #[async_trait]
    impl Linter for FixedLinter {
        fn name(&self) -> &str {
            self.name
        }

        fn can_handle(&self, _path: &Path) -> bool {
            true
        }

        fn configure(&self, _config: &Value) -> Result<(), LintError> {
            Ok(())
        }

        fn config(&self) -> Value {
            Value::Null
        }

        async fn lint(
            &self,
            _path: &Path,
            _content: &[u8],
            _overrides: &LintOverrides,
        ) -> Result<LintReport, LintError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.report.clone())
        }
    }

    struct BrokenLinter;

    #[async_trait]
    impl Linter for BrokenLinter {
        fn name(&self) -> &str {
            "broken"
        }

        fn can_handle(&self, _path: &Path) -> bool {
            true
        }

        fn configure(&self, _config: &Value) -> Result<(), LintError> {
            Ok(())
        }

        fn config(&self) -> Value {
            Value::Null
        }

        async fn lint(
            &self,
            _path: &Path,
            _content: &[u8],
            _overrides: &LintOverrides,
        ) -> Result<LintReport, LintError> {
            Err(LintError::ToolFailed {
                tool: "broken".to_string(),
                reason: "exploded".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_zero_workers_uses_cpu_count() {
        assert_eq!(ParallelExecutor::new(0).max_workers(), num_cpus::get().max(1));
        assert_eq!(ParallelExecutor::new(3).max_workers(), 3);
    }

    #[tokio::test]
    async fn test_tasks_respect_worker_limit() {
        let executor = ParallelExecutor::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .collect();

        let results = executor.execute_tasks(tasks, |_| -1).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_linter_results_keep_linter_order() {
        let path = Path::new("a.txt");
        let linters: Vec<Arc<dyn Linter>> = vec![
            Arc::new(FixedLinter {
                name: "slow",
                report: LintReport::from_issues(vec![Issue::warning(path, 1, 1, "slow", "S")]),
                delay: Duration::from_millis(30),
            }),
            Arc::new(FixedLinter {
                name: "fast",
                report: LintReport::clean(),
                delay: Duration::ZERO,
            }),
        ];

        let results = ParallelExecutor::new(4)
            .execute_linters(&linters, path, b"x", |_| LintOverrides::default())
            .await;
        let names: Vec<_> = results.iter().map(|r| r.linter_name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_aggregate_merges_reports_and_failures() {
        let path = Path::new("a.py");
        let mut formatted = LintReport::from_issues(vec![Issue::error(path, 3, 1, "bad", "E1")]);
        formatted.formatted = Some("fixed".to_string());
        formatted.test_output = Some("1 failed".to_string());

        let linters: Vec<Arc<dyn Linter>> = vec![
            Arc::new(FixedLinter {
                name: "first",
                report: formatted,
                delay: Duration::ZERO,
            }),
            Arc::new(FixedLinter {
                name: "second",
                report: LintReport::from_issues(vec![Issue::warning(path, 1, 1, "meh", "W1")]),
                delay: Duration::ZERO,
            }),
            Arc::new(BrokenLinter),
        ];

        let results = ParallelExecutor::new(2)
            .execute_linters(&linters, path, b"", |_| LintOverrides::default())
            .await;
        let (report, failures) = aggregate_results(results);

        assert!(!report.success);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.formatted.as_deref(), Some("fixed"));
        assert_eq!(report.test_output.as_deref(), Some("1 failed"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].linter, "broken");
    }
}
