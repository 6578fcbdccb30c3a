//! Turns one hook invocation into an exit code and output streams

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::handler::{Handler, Registry};
use super::messages::{ExitCode, HookEventName, HookMessage, HookResponse};
use super::parser::{marshal_hook_response, parse_hook_message};
use super::HookError;
use crate::rules::RuleEngine;

/// Time budget for evaluating a single message.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// What the hook process should emit for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub exit_code: ExitCode,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl HookOutcome {
    fn success() -> Self {
        Self {
            exit_code: ExitCode::Success,
            stdout: Vec::new(),
            stderr: String::new(),
        }
    }

    fn with_stdout(stdout: Vec<u8>) -> Self {
        Self {
            stdout,
            ..Self::success()
        }
    }

    fn blocking(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::Blocking,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs a message through the handler under a timeout.
pub struct Executor {
    handler: Handler,
    registry: Registry,
    timeout: Duration,
}

impl Executor {
    pub fn new(rule_engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            handler: Handler::new(rule_engine),
            registry: Registry::new(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_rule_engine(&self, engine: Arc<dyn RuleEngine>) {
        self.handler.set_rule_engine(engine);
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Decodes `input`, evaluates it and maps the response to process output.
    ///
    /// # Errors
    /// - `HookError::Parse` / `HookError::UnknownEvent` - Input is not a hook message
    /// - `HookError::Timeout` - Evaluation exceeded the configured timeout
    /// - Any error returned by the rule engine
    pub async fn execute(&self, input: &[u8]) -> Result<HookOutcome, HookError> {
        let msg = parse_hook_message(input)?;
        let event = msg.event_name();

        let response = match tokio::time::timeout(self.timeout, self.process(&msg)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(%event, timeout = ?self.timeout, "Hook evaluation timed out");
                return Err(HookError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let Some(response) = response else {
            return Ok(HookOutcome::success());
        };

        tracing::debug!(%event, blocking = response.is_blocking(), "Hook produced a response");
        outcome_for(event, &response)
    }

    /// Reads the whole reader and executes its contents as one message.
    ///
    /// # Errors
    /// Returns `HookError::Io` if reading fails, otherwise as [`Executor::execute`].
    pub async fn execute_reader<R>(&self, mut reader: R) -> Result<HookOutcome, HookError>
    where
        R: AsyncRead + Unpin,
    {
        let mut input = Vec::new();
        reader.read_to_end(&mut input).await?;
        self.execute(&input).await
    }

    async fn process(&self, msg: &HookMessage) -> Result<Option<HookResponse>, HookError> {
        if let Some(tool) = msg.tool_name() {
            let hooks = self.registry.matching(msg.event_name(), tool);
            if !hooks.is_empty() {
                let names: Vec<_> = hooks.iter().map(|h| h.name.as_str()).collect();
                tracing::debug!(tool, hooks = ?names, "Registered hooks match tool");
            }
        }
        self.handler.process_message(msg).await
    }
}

fn outcome_for(event: HookEventName, response: &HookResponse) -> Result<HookOutcome, HookError> {
    match event {
        HookEventName::PostToolUse => {
            // Only stderr with exit 2 reaches the agent after a tool ran
            match response.feedback_text() {
                Some(text) => Ok(HookOutcome::blocking(text)),
                None => Ok(HookOutcome::success()),
            }
        }
        _ if response.is_blocking() => Ok(HookOutcome::blocking(
            response.feedback_text().unwrap_or("blocked"),
        )),
        _ => Ok(HookOutcome::with_stdout(marshal_hook_response(response)?)),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::hook::messages::{PostToolUseMessage, StopMessage};
    use crate::rules::{BaseRuleEngine, BlockingRuleEngine, RuleResult};

    struct PostFeedback(Option<&'static str>);

    #[async_trait]
    impl RuleEngine for PostFeedback {
        async fn evaluate_post_tool_use(&self, _msg: &PostToolUseMessage) -> RuleResult {
            Ok(self.0.map(HookResponse::block))
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl RuleEngine for SlowEngine {
        async fn evaluate_stop(&self, _msg: &StopMessage) -> RuleResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    const PRE_BASH: &[u8] =
        br#"{"hook_event_name":"PreToolUse","tool_name":"Bash","tool_input":{"command":"ls"}}"#;
    const POST_WRITE: &[u8] = br#"{"hook_event_name":"PostToolUse","tool_name":"Write",
        "tool_input":{"file_path":"a.py"}}"#;

    #[tokio::test]
    async fn test_pre_tool_use_approval_goes_to_stdout() {
        let executor = Executor::new(Arc::new(BaseRuleEngine::new()));
        let outcome = executor.execute(PRE_BASH).await.unwrap();

        assert_eq!(outcome.exit_code, ExitCode::Success);
        assert_eq!(outcome.stdout, b"{\"decision\":\"approve\"}\n");
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_pre_tool_use_block_exits_blocking() {
        let executor = Executor::new(Arc::new(BlockingRuleEngine::new(["Bash"])));
        let outcome = executor.execute(PRE_BASH).await.unwrap();

        assert_eq!(outcome.exit_code, ExitCode::Blocking);
        assert_eq!(outcome.stderr, "Tool Bash is blocked by policy");
        assert!(outcome.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_post_tool_use_feedback_goes_to_stderr() {
        let executor = Executor::new(Arc::new(PostFeedback(Some("3 issues"))));
        let outcome = executor.execute(POST_WRITE).await.unwrap();
        assert_eq!(outcome.exit_code, ExitCode::Blocking);
        assert_eq!(outcome.stderr, "3 issues");

        executor.set_rule_engine(Arc::new(PostFeedback(None)));
        let outcome = executor.execute(POST_WRITE).await.unwrap();
        assert_eq!(outcome, HookOutcome::success());
    }

    #[tokio::test]
    async fn test_parse_errors_are_returned() {
        let executor = Executor::new(Arc::new(BaseRuleEngine::new()));
        assert!(matches!(
            executor.execute(b"{").await,
            Err(HookError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let mut executor = Executor::new(Arc::new(SlowEngine));
        executor.set_timeout(Duration::from_millis(20));

        let result = executor.execute(br#"{"hook_event_name":"Stop"}"#).await;
        assert!(matches!(result, Err(HookError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_execute_reader() {
        let executor = Executor::new(Arc::new(BaseRuleEngine::new()));
        let outcome = executor.execute_reader(PRE_BASH).await.unwrap();
        assert_eq!(outcome.exit_code, ExitCode::Success);
    }
}
