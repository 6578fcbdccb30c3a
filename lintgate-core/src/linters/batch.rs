//! Linting many files at once

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;

use super::parallel::{LintTaskResult, LinterFailure, aggregate_results};
use super::{LintOverrides, LintReport, Linter};

/// Aggregated outcome for one file of a batch.
#[derive(Debug)]
pub struct BatchFileResult {
    pub path: PathBuf,
    pub report: LintReport,
    pub failures: Vec<LinterFailure>,
}

/// Hands every linter all the files it can handle in one call.
pub struct BatchExecutor {
    linters: Vec<Arc<dyn Linter>>,
}

impl BatchExecutor {
    pub fn new(linters: Vec<Arc<dyn Linter>>) -> Self {
        Self { linters }
    }

    /// Lints `files`, returning one result per file in input order.
    ///
    /// Linters run concurrently. Within a linter, files sharing the same
    /// overrides are passed together to [`Linter::lint_batch`].
    pub async fn execute<O>(
        &self,
        files: &[(PathBuf, Vec<u8>)],
        overrides_for: O,
    ) -> Vec<BatchFileResult>
    where
        O: Fn(&Path, &str) -> LintOverrides,
    {
        let mut jobs = Vec::new();
        for linter in &self.linters {
            let mut groups: Vec<(LintOverrides, Vec<(PathBuf, Vec<u8>)>)> = Vec::new();
            for (path, content) in files.iter().filter(|(p, _)| linter.can_handle(p)) {
                let overrides = overrides_for(path, linter.name());
                match groups.iter_mut().find(|(o, _)| *o == overrides) {
                    Some((_, group)) => group.push((path.clone(), content.clone())),
                    None => groups.push((overrides, vec![(path.clone(), content.clone())])),
                }
            }
            for (overrides, group) in groups {
                jobs.push((Arc::clone(linter), overrides, group));
            }
        }

        tracing::debug!(files = files.len(), jobs = jobs.len(), "Running batch lint");

        let outputs = join_all(jobs.iter().map(|(linter, overrides, group)| async move {
            let results = linter.lint_batch(group, overrides).await;
            (linter.name().to_string(), results)
        }))
        .await;

        let mut per_file: HashMap<PathBuf, Vec<LintTaskResult>> = HashMap::new();
        for (linter_name, results) in outputs {
            for (path, result) in results {
                per_file.entry(path).or_default().push(LintTaskResult {
                    linter_name: linter_name.clone(),
                    result,
                });
            }
        }

        files
            .iter()
            .map(|(path, _)| {
                let results = per_file.remove(path).unwrap_or_default();
                let (report, failures) = aggregate_results(results);
                BatchFileResult {
                    path: path.clone(),
                    report,
                    failures,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::linters::{Issue, LintError, extension};

    /// Flags every line containing "bad" and counts batch calls.
    struct WordLinter {
        ext: &'static str,
        batches: AtomicUsize,
    }

    impl WordLinter {
        fn new(ext: &'static str) -> Self {
            Self {
                ext,
                batches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Linter for WordLinter {
        fn name(&self) -> &str {
            self.ext
        }

        fn can_handle(&self, path: &Path) -> bool {
            extension(path).as_deref() == Some(self.ext)
        }

        fn configure(&self, _config: &Value) -> Result<(), LintError> {
            Ok(())
        }

        fn config(&self) -> Value {
            Value::Null
        }

        async fn lint(
            &self,
            path: &Path,
            content: &[u8],
            _overrides: &LintOverrides,
        ) -> Result<LintReport, LintError> {
            let text = String::from_utf8_lossy(content);
            let issues = text
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains("bad"))
                .map(|(i, _)| Issue::error(path, i + 1, 1, "bad word", "word"))
                .collect();
            Ok(LintReport::from_issues(issues))
        }

        async fn lint_batch(
            &self,
            files: &[(PathBuf, Vec<u8>)],
            overrides: &LintOverrides,
        ) -> Vec<(PathBuf, Result<LintReport, LintError>)> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            let mut results = Vec::new();
            for (path, content) in files {
                results.push((path.clone(), self.lint(path, content, overrides).await));
            }
            results
        }
    }

    #[tokio::test]
    async fn test_batch_routes_files_to_their_linters() {
        let py = Arc::new(WordLinter::new("py"));
        let md = Arc::new(WordLinter::new("md"));
        let linters: Vec<Arc<dyn Linter>> = vec![py.clone() as Arc<dyn Linter>, md.clone()];
        let executor = BatchExecutor::new(linters);

        let files = vec![
            (PathBuf::from("a.py"), b"ok\nbad\n".to_vec()),
            (PathBuf::from("b.md"), b"fine\n".to_vec()),
            (PathBuf::from("c.py"), b"bad\n".to_vec()),
            (PathBuf::from("d.txt"), b"bad\n".to_vec()),
        ];

        let results = executor
            .execute(&files, |_, _| LintOverrides::default())
            .await;

        let paths: Vec<_> = results.iter().map(|r| r.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["a.py", "b.md", "c.py", "d.txt"]);
        assert_eq!(results[0].report.issues[0].line, 2);
        assert!(results[1].report.success);
        assert!(!results[2].report.success);
        // No linter handles .txt
        assert!(results[3].report.issues.is_empty());

        assert_eq!(py.batches.load(Ordering::SeqCst), 1);
        assert_eq!(md.batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_splits_groups_by_overrides() {
        let py = Arc::new(WordLinter::new("py"));
        let linters: Vec<Arc<dyn Linter>> = vec![py.clone() as Arc<dyn Linter>];
        let executor = BatchExecutor::new(linters);
        let files = vec![
            (PathBuf::from("src/a.py"), Vec::new()),
            (PathBuf::from("tests/b.py"), Vec::new()),
            (PathBuf::from("src/c.py"), Vec::new()),
        ];

        executor
            .execute(&files, |path, _| {
                let mut overrides = LintOverrides::default();
                if path.starts_with("tests") {
                    overrides.merge(serde_json::json!({"maxArgs": 10}).as_object().unwrap());
                }
                overrides
            })
            .await;

        assert_eq!(py.batches.load(Ordering::SeqCst), 2);
    }
}
