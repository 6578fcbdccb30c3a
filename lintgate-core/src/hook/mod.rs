//! Hook protocol: wire types, decoding, dispatch and process-level execution
//!
//! A coding agent invokes the hook binary once per event, writing a single
//! JSON message to stdin. The exit code and the stdout/stderr streams form
//! the reply.

pub mod executor;
pub mod handler;
pub mod messages;
pub mod parser;
pub mod tool_input;

pub use executor::{DEFAULT_HOOK_TIMEOUT, Executor, HookOutcome};
pub use handler::{Handler, HookConfig, Registry};
pub use messages::{
    Decision, ExitCode, HookEventName, HookMessage, HookResponse, NotificationMessage,
    PostToolUseMessage, PreCompactMessage, PreToolUseMessage, SessionInfo, StopMessage,
    SubagentStopMessage,
};
pub use parser::{
    marshal_hook_response, parse_hook_message, parse_hook_response, parse_multiple,
};
pub use tool_input::{EditOperation, ToolInput};

/// Errors raised while decoding, evaluating or answering a hook message.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to parse hook message: {reason}")]
    Parse { reason: String },

    #[error("unknown hook event type: {name}")]
    UnknownEvent { name: String },

    #[error("invalid input for tool {tool}: {reason}")]
    InvalidToolInput { tool: String, reason: String },

    #[error("rule evaluation failed: {reason}")]
    RuleEvaluation { reason: String },

    #[error("hook processing timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
