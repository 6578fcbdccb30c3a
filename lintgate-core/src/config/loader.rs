//! Locating and merging configuration files

use std::path::{Path, PathBuf};

use super::{ConfigError, GateConfig};

const CONFIG_DIR: &str = ".claude";
const CONFIG_FILE: &str = "lintgate.json";
const LOCAL_CONFIG_FILE: &str = "lintgate.local.json";

/// Loads configuration from the user, project and local files.
///
/// Files are applied in increasing precedence:
/// 1. `~/.claude/lintgate.json`
/// 2. `<project>/.claude/lintgate.json`
/// 3. `<project>/.claude/lintgate.local.json`
/// 4. an explicit file, if one was given
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    home_dir: Option<PathBuf>,
    project_dir: PathBuf,
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader rooted at the current project and the user's home directory.
    ///
    /// # Errors
    /// Returns `ConfigError::Read` if the working directory is unavailable.
    pub fn new() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::with_dirs(home_dir(), find_project_root(&cwd)))
    }

    pub fn with_dirs(home_dir: Option<PathBuf>, project_dir: PathBuf) -> Self {
        Self {
            home_dir,
            project_dir,
            explicit: None,
        }
    }

    /// Adds an explicit configuration file applied after all others.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Candidate files, lowest precedence first.
    pub fn config_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(home) = &self.home_dir {
            paths.push(home.join(CONFIG_DIR).join(CONFIG_FILE));
        }
        let project = self.project_dir.join(CONFIG_DIR);
        paths.push(project.join(CONFIG_FILE));
        paths.push(project.join(LOCAL_CONFIG_FILE));
        paths.extend(self.explicit.iter().cloned());
        paths
    }

    /// True when at least one candidate file exists.
    pub fn config_exists(&self) -> bool {
        self.config_paths().iter().any(|p| p.is_file())
    }

    /// Loads and merges every existing file, then applies environment
    /// overrides.
    ///
    /// # Errors
    /// - `ConfigError::Read` - A file exists but cannot be read, or the
    ///   explicit file is missing
    /// - `ConfigError::Parse` - A file is not valid configuration JSON
    pub fn load(&self) -> Result<GateConfig, ConfigError> {
        let mut config = self.load_files()?;
        config.apply_env();
        Ok(config)
    }

    /// Like [`ConfigLoader::load`] without environment overrides.
    ///
    /// # Errors
    /// See [`ConfigLoader::load`].
    pub fn load_files(&self) -> Result<GateConfig, ConfigError> {
        let mut config = GateConfig::default();
        for path in self.config_paths() {
            let required = self.explicit.as_deref() == Some(path.as_path());
            if let Some(file_config) = load_file(&path, required)? {
                tracing::debug!(path = %path.display(), "Loaded configuration file");
                config.merge(file_config);
            }
        }
        Ok(config)
    }
}

/// Reads one file; a missing optional file yields `None`.
fn load_file(path: &Path, required: bool) -> Result<Option<GateConfig>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    GateConfig::from_json(path, &text).map(Some)
}

/// Nearest ancestor of `start` containing `.git`, or `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(start)
        .to_path_buf()
}

/// The user's home directory from the environment.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_dirs(Some(home.path().into()), project.path().into());

        assert!(!loader.config_exists());
        assert_eq!(loader.load_files().unwrap(), GateConfig::default());
    }

    #[test]
    fn test_precedence_order() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write(
            &home.path().join(".claude/lintgate.json"),
            r#"{"linters": {"python": {"config": {"maxArgs": 3}}, "json": {"enabled": false}}}"#,
        );
        write(
            &project.path().join(".claude/lintgate.json"),
            r#"{"linters": {"python": {"config": {"maxArgs": 4}}}}"#,
        );
        write(
            &project.path().join(".claude/lintgate.local.json"),
            r#"{"linters": {"python": {"config": {"maxArgs": 5}}}}"#,
        );
        let explicit = project.path().join("custom.json");
        write(&explicit, r#"{"linters": {"json": {"enabled": true}}}"#);

        let loader = ConfigLoader::with_dirs(Some(home.path().into()), project.path().into());
        let config = loader.load_files().unwrap();
        assert_eq!(config.linter_config("python").unwrap()["maxArgs"], 5);
        assert!(!config.is_linter_enabled("json"));

        let config = loader.with_explicit(&explicit).load_files().unwrap();
        assert!(config.is_linter_enabled("json"));
        assert_eq!(config.linter_config("python").unwrap()["maxArgs"], 5);
    }

    #[test]
    fn test_invalid_file_is_reported_with_path() {
        let project = tempfile::tempdir().unwrap();
        let path = project.path().join(".claude/lintgate.json");
        write(&path, "{ broken");

        let err = ConfigLoader::with_dirs(None, project.path().into())
            .load_files()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: p, .. } if p == path));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let project = tempfile::tempdir().unwrap();
        let err = ConfigLoader::with_dirs(None, project.path().into())
            .with_explicit(project.path().join("nope.json"))
            .load_files()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_find_project_root() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join(".git")).unwrap();
        let nested = root.path().join("src/pkg");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), root.path());

        let lonely = tempfile::tempdir().unwrap();
        assert_eq!(find_project_root(lonely.path()), lonely.path());
    }
}
