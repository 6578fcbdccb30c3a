//! Installs the lintgate hook into agent settings files
//!
//! `lintgate init` adds a `PostToolUse` command hook to
//! `~/.claude/settings.json` and/or `.claude/settings.json`, leaving every
//! other setting untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::{Map, Value, json};

use crate::config::loader::home_dir;

/// Command the agent runs for each hook event.
pub const HOOK_COMMAND: &str = "lintgate";
/// Hook timeout written into settings, in milliseconds.
pub const HOOK_TIMEOUT_MS: u64 = 60_000;

const SETTINGS_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.json";

/// Errors raised while reading or updating settings files.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {reason}")]
    InvalidSettings { path: PathBuf, reason: String },

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Which settings files `init` touches and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOptions {
    pub global_only: bool,
    pub project_only: bool,
    pub dry_run: bool,
    pub force: bool,
}

impl InitOptions {
    /// Settings files to update, global first.
    ///
    /// # Errors
    /// Returns `SetupError::NoHomeDirectory` when the global file is wanted
    /// but no home directory is known.
    pub fn targets(&self, home: Option<&Path>, project: &Path) -> Result<Vec<PathBuf>, SetupError> {
        let mut targets = Vec::new();
        if !self.project_only {
            let home = home.ok_or(SetupError::NoHomeDirectory)?;
            targets.push(settings_path(home));
        }
        if !self.global_only {
            targets.push(settings_path(project));
        }
        Ok(targets)
    }

    /// [`InitOptions::targets`] for the current user and working directory.
    ///
    /// # Errors
    /// See [`InitOptions::targets`].
    pub fn default_targets(&self) -> Result<Vec<PathBuf>, SetupError> {
        let project = std::env::current_dir().map_err(|source| SetupError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        self.targets(home_dir().as_deref(), &project)
    }
}

fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

/// The hook entry lintgate installs.
pub fn hook_entry() -> Value {
    json!({
        "type": "command",
        "command": HOOK_COMMAND,
        "timeout": HOOK_TIMEOUT_MS,
    })
}

fn is_lintgate_hook(hook: &Value) -> bool {
    hook.get("type").and_then(Value::as_str) == Some("command")
        && hook.get("command").and_then(Value::as_str) == Some(HOOK_COMMAND)
}

fn has_empty_matcher(group: &Value) -> bool {
    group
        .get("matcher")
        .map_or(true, |m| m.as_str() == Some(""))
}

/// Settings with the lintgate hook installed, or `None` when `existing`
/// already has it.
///
/// An existing lintgate entry under an empty matcher is normalised; otherwise
/// the entry is appended to the first empty-matcher group, or a new group is
/// created.
pub fn plan_settings_change(existing: &Value) -> Option<Value> {
    let mut updated = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let hooks = updated
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()));
    if !hooks.is_object() {
        *hooks = Value::Object(Map::new());
    }
    let post_tool_use = hooks
        .as_object_mut()?
        .entry("PostToolUse")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !post_tool_use.is_array() {
        *post_tool_use = Value::Array(Vec::new());
    }
    let groups = post_tool_use.as_array_mut()?;

    let mut found = false;
    for group in groups.iter_mut().filter(|g| has_empty_matcher(g)) {
        if let Some(entries) = group.get_mut("hooks").and_then(Value::as_array_mut) {
            if let Some(entry) = entries.iter_mut().find(|h| is_lintgate_hook(h)) {
                *entry = hook_entry();
                found = true;
                break;
            }
        }
    }

    if !found {
        let target = groups
            .iter_mut()
            .filter(|g| has_empty_matcher(g))
            .find_map(|g| g.get_mut("hooks").and_then(Value::as_array_mut));
        match target {
            Some(entries) => entries.push(hook_entry()),
            None => groups.push(json!({"matcher": "", "hooks": [hook_entry()]})),
        }
    }

    let updated = Value::Object(updated);
    (updated != *existing).then_some(updated)
}

/// A pending update of one settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsChange {
    pub path: PathBuf,
    /// `None` when the file does not exist yet
    pub original: Option<Value>,
    pub updated: Value,
}

impl SettingsChange {
    /// Human-readable summary of the change.
    pub fn describe(&self) -> String {
        let updated_hooks = self
            .updated
            .pointer("/hooks/PostToolUse")
            .cloned()
            .unwrap_or(Value::Null);

        let mut out = String::new();
        match self.original.as_ref().and_then(|o| o.pointer("/hooks/PostToolUse")) {
            None if self.original.is_none() => {
                out.push_str("Creating new settings file:\n");
                push_lines(&mut out, '+', &self.updated);
            }
            None => {
                out.push_str("Adding 'PostToolUse' hooks:\n");
                push_lines(&mut out, '+', &json!({"PostToolUse": updated_hooks}));
            }
            Some(original_hooks) => {
                out.push_str("Modifying 'PostToolUse' hooks:\n");
                push_lines(&mut out, '-', &json!({"PostToolUse": original_hooks}));
                push_lines(&mut out, '+', &json!({"PostToolUse": updated_hooks}));
            }
        }
        out
    }
}

fn push_lines(out: &mut String, marker: char, value: &Value) {
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    for line in text.lines() {
        out.push(marker);
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
}

/// Reads a settings file; a missing file yields `None`.
///
/// # Errors
/// - `SetupError::Read` - The file exists but cannot be read
/// - `SetupError::InvalidSettings` - The file is not a JSON object
pub fn read_settings(path: &Path) -> Result<Option<Value>, SetupError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SetupError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let invalid = |reason: String| SetupError::InvalidSettings {
        path: path.to_path_buf(),
        reason,
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    if value.get("hooks").is_some_and(|h| !h.is_object()) {
        return Err(invalid("\"hooks\" must be an object".to_string()));
    }
    Ok(Some(value))
}

/// Works out the change needed for `path`, if any.
///
/// # Errors
/// See [`read_settings`].
pub fn prepare_change(path: &Path) -> Result<Option<SettingsChange>, SetupError> {
    let original = read_settings(path)?;
    let base = original.clone().unwrap_or_else(|| Value::Object(Map::new()));
    Ok(plan_settings_change(&base).map(|updated| SettingsChange {
        path: path.to_path_buf(),
        original,
        updated,
    }))
}

/// `<path>.backup-YYYYMMDD-HHMMSS`
pub fn backup_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup-{}", now.format("%Y%m%d-%H%M%S")));
    PathBuf::from(name)
}

/// Writes the change, backing up an existing file first.
///
/// Returns the backup path when one was made.
///
/// # Errors
/// Returns `SetupError::Write` when the backup or the new file cannot be
/// written.
pub fn apply_change(change: &SettingsChange) -> Result<Option<PathBuf>, SetupError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| SetupError::Write { path, source }
    };

    let backup = if change.path.exists() {
        let backup = backup_path(&change.path, Local::now());
        std::fs::copy(&change.path, &backup).map_err(write_err(&backup))?;
        tracing::info!(backup = %backup.display(), "Backed up settings");
        Some(backup)
    } else {
        None
    };

    if let Some(dir) = change.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(write_err(dir))?;
    }

    let mut text =
        serde_json::to_string_pretty(&change.updated).map_err(|e| SetupError::InvalidSettings {
            path: change.path.clone(),
            reason: e.to_string(),
        })?;
    text.push('\n');
    std::fs::write(&change.path, text).map_err(write_err(&change.path))?;
    tracing::info!(path = %change.path.display(), "Updated settings");
    Ok(backup)
}
