//! Embedding API
//!
//! [`Gate`] bundles the executor, handler and registry behind a small
//! surface for programs that want to run hook processing in-process.

use std::sync::Arc;
use std::time::Duration;

use crate::hook::{
    DEFAULT_HOOK_TIMEOUT, Executor, HookConfig, HookError, HookOutcome, HookResponse, Registry,
    parse_hook_message,
};
use crate::rules::{BaseRuleEngine, RuleEngine};

/// In-process hook processor.
pub struct Gate {
    executor: Executor,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Gate that approves every tool use.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> GateBuilder {
        GateBuilder::default()
    }

    /// Decodes `input` and evaluates it without the process-level mapping.
    ///
    /// # Errors
    /// Returns `HookError` when the input cannot be parsed or evaluation fails.
    pub async fn process_message(&self, input: &[u8]) -> Result<Option<HookResponse>, HookError> {
        let message = parse_hook_message(input)?;
        self.executor.handler().process_message(&message).await
    }

    /// Runs the full hook pipeline and returns exit code and streams.
    ///
    /// # Errors
    /// Returns `HookError` on parse failure or timeout.
    pub async fn execute(&self, input: &[u8]) -> Result<HookOutcome, HookError> {
        self.executor.execute(input).await
    }

    pub fn set_rule_engine(&self, engine: Arc<dyn RuleEngine>) {
        self.executor.set_rule_engine(engine);
    }

    pub fn registry(&self) -> &Registry {
        self.executor.registry()
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn timeout(&self) -> Duration {
        self.executor.timeout()
    }
}

/// Builder for [`Gate`].
pub struct GateBuilder {
    timeout: Duration,
    rule_engine: Arc<dyn RuleEngine>,
    hooks: Vec<HookConfig>,
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HOOK_TIMEOUT,
            rule_engine: Arc::new(BaseRuleEngine::new()),
            hooks: Vec::new(),
        }
    }
}

impl GateBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rule_engine(mut self, engine: Arc<dyn RuleEngine>) -> Self {
        self.rule_engine = engine;
        self
    }

    pub fn register_hook(mut self, hook: HookConfig) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Gate {
        let mut executor = Executor::new(self.rule_engine);
        executor.set_timeout(self.timeout);
        for hook in self.hooks {
            executor.registry().register(hook);
        }
        Gate { executor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{Decision, ExitCode, HookEventName};
    use crate::rules::BlockingRuleEngine;

    const PRE_BASH: &[u8] = br#"{"hook_event_name":"PreToolUse","session_id":"s1",
        "tool_name":"Bash","tool_input":{"command":"ls"}}"#;

    #[tokio::test]
    async fn test_default_gate_approves() {
        let gate = Gate::new();
        let response = gate.process_message(PRE_BASH).await.unwrap().unwrap();
        assert_eq!(response.decision, Some(Decision::Approve));
        assert_eq!(gate.timeout(), DEFAULT_HOOK_TIMEOUT);
    }

    #[tokio::test]
    async fn test_builder_configures_gate() {
        let gate = Gate::builder()
            .timeout(Duration::from_secs(5))
            .rule_engine(Arc::new(BlockingRuleEngine::new(["Bash"])))
            .register_hook(
                HookConfig::new("audit", HookEventName::PreToolUse).with_tool_pattern("Bash"),
            )
            .build();

        assert_eq!(gate.timeout(), Duration::from_secs(5));
        assert_eq!(gate.registry().matching(HookEventName::PreToolUse, "Bash").len(), 1);

        let outcome = gate.execute(PRE_BASH).await.unwrap();
        assert_eq!(outcome.exit_code, ExitCode::Blocking);
        assert_eq!(outcome.stderr, "Tool Bash is blocked by policy");
    }

    #[tokio::test]
    async fn test_swapping_engines() {
        let gate = Gate::new();
        gate.set_rule_engine(Arc::new(BlockingRuleEngine::new(["Bash"])));
        let response = gate.process_message(PRE_BASH).await.unwrap().unwrap();
        assert!(response.is_blocking());
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let err = Gate::new().process_message(b"not json").await.unwrap_err();
        assert!(matches!(err, HookError::Parse { .. }));
    }
}
