//! Lintgate Core - Linting feedback for coding-agent tool hooks
//!
//! This crate provides the building blocks for a hook processor that sits
//! between a coding agent and the files it edits: hook message decoding,
//! rule engines, a set of file linters, layered configuration, and the
//! settings installer used by `lintgate init`.

pub mod api;
pub mod config;
pub mod hook;
pub mod linters;
pub mod rules;
pub mod setup;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use api::{Gate, GateBuilder};
pub use config::{ConfigError, ConfigLoader, GateConfig};
pub use hook::{
    Executor, ExitCode, Handler, HookError, HookMessage, HookOutcome, HookResponse, Registry,
};
pub use linters::{Issue, LintError, LintReport, Linter, Severity};
pub use rules::{
    BaseRuleEngine, BlockingRuleEngine, CompositeRuleEngine, LintingRuleEngine, RuleEngine,
};
pub use setup::SetupError;

/// Errors that can bubble up from any Lintgate subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Lint error: {0}")]
    Lint(#[from] LintError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            GateError::Hook(e) => match e {
                HookError::Parse { reason } => format!("Could not parse hook input: {reason}"),
                HookError::UnknownEvent { name } => format!("Unsupported hook event: {name}"),
                HookError::Timeout { seconds } => {
                    format!("Hook processing timed out after {seconds}s")
                }
                _ => "Hook processing failed".to_string(),
            },
            GateError::Lint(e) => format!("Linting failed: {e}"),
            GateError::Config(ConfigError::Parse { path, .. }) => {
                format!("Invalid configuration file: {}", path.display())
            }
            GateError::Config(_) => "Configuration error occurred".to_string(),
            GateError::Setup(e) => format!("Setup failed: {e}"),
            GateError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GateError::Config(ConfigError::Parse { .. })
                | GateError::Config(ConfigError::InvalidDuration { .. })
                | GateError::Hook(HookError::Parse { .. })
                | GateError::Hook(HookError::UnknownEvent { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
