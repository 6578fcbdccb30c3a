//! Rule engines deciding how each hook event is answered
//!
//! The handler forwards every decoded message to a [`RuleEngine`]. Engines
//! compose: [`CompositeRuleEngine`] chains policies such as
//! [`BlockingRuleEngine`] in front of the [`LintingRuleEngine`].

pub mod feedback;
pub mod linting;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

pub use feedback::format_feedback;
pub use linting::{FileActions, LinterAction, LintingRuleEngine, default_linters};

use crate::hook::{
    HookError, HookResponse, NotificationMessage, PostToolUseMessage, PreCompactMessage,
    PreToolUseMessage, StopMessage, SubagentStopMessage,
};

/// Result of evaluating one hook message. `None` means "no opinion".
pub type RuleResult = Result<Option<HookResponse>, HookError>;

/// Evaluates hook messages and produces responses.
///
/// Every method has a permissive default so engines only implement the
/// events they care about.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Decides whether a tool may run.
    async fn evaluate_pre_tool_use(&self, _msg: &PreToolUseMessage) -> RuleResult {
        Ok(Some(HookResponse::approve()))
    }

    /// Reviews the effect of a tool after it ran.
    async fn evaluate_post_tool_use(&self, _msg: &PostToolUseMessage) -> RuleResult {
        Ok(None)
    }

    async fn evaluate_notification(&self, _msg: &NotificationMessage) -> RuleResult {
        Ok(None)
    }

    async fn evaluate_stop(&self, _msg: &StopMessage) -> RuleResult {
        Ok(None)
    }

    async fn evaluate_subagent_stop(&self, _msg: &SubagentStopMessage) -> RuleResult {
        Ok(None)
    }

    async fn evaluate_pre_compact(&self, _msg: &PreCompactMessage) -> RuleResult {
        Ok(None)
    }
}

/// Approves every tool use and stays silent on all other events.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseRuleEngine;

impl BaseRuleEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuleEngine for BaseRuleEngine {}

/// Blocks a fixed set of tools by name.
#[derive(Debug, Default, Clone)]
pub struct BlockingRuleEngine {
    blocked_tools: HashSet<String>,
}

impl BlockingRuleEngine {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked_tools: tools.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_blocked(&self, tool_name: &str) -> bool {
        self.blocked_tools.contains(tool_name)
    }
}

#[async_trait]
impl RuleEngine for BlockingRuleEngine {
    async fn evaluate_pre_tool_use(&self, msg: &PreToolUseMessage) -> RuleResult {
        if self.is_blocked(&msg.tool_name) {
            tracing::info!(tool = %msg.tool_name, "Blocking tool by policy");
            return Ok(Some(HookResponse::block(format!(
                "Tool {} is blocked by policy",
                msg.tool_name
            ))));
        }
        Ok(Some(HookResponse::approve()))
    }
}

/// Runs engines in order and combines their answers.
///
/// PreToolUse yields the first blocking response (or an approval); every
/// other event yields the first non-empty response.
#[derive(Default, Clone)]
pub struct CompositeRuleEngine {
    engines: Vec<Arc<dyn RuleEngine>>,
}

impl CompositeRuleEngine {
    pub fn new(engines: Vec<Arc<dyn RuleEngine>>) -> Self {
        Self { engines }
    }

    pub fn add_engine(&mut self, engine: Arc<dyn RuleEngine>) {
        self.engines.push(engine);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Returns the first `Some` produced by `evaluate` over `engines`.
macro_rules! first_response {
    ($engines:expr, $method:ident, $msg:expr) => {{
        for engine in $engines {
            if let Some(response) = engine.$method($msg).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }};
}

#[async_trait]
impl RuleEngine for CompositeRuleEngine {
    async fn evaluate_pre_tool_use(&self, msg: &PreToolUseMessage) -> RuleResult {
        let mut message = None;
        for engine in &self.engines {
            if let Some(response) = engine.evaluate_pre_tool_use(msg).await? {
                if response.is_blocking() {
                    return Ok(Some(response));
                }
                if message.is_none() {
                    message = response.message;
                }
            }
        }
        let mut approval = HookResponse::approve();
        approval.message = message;
        Ok(Some(approval))
    }

    async fn evaluate_post_tool_use(&self, msg: &PostToolUseMessage) -> RuleResult {
        first_response!(&self.engines, evaluate_post_tool_use, msg)
    }

    async fn evaluate_notification(&self, msg: &NotificationMessage) -> RuleResult {
        first_response!(&self.engines, evaluate_notification, msg)
    }

    async fn evaluate_stop(&self, msg: &StopMessage) -> RuleResult {
        first_response!(&self.engines, evaluate_stop, msg)
    }

    async fn evaluate_subagent_stop(&self, msg: &SubagentStopMessage) -> RuleResult {
        first_response!(&self.engines, evaluate_subagent_stop, msg)
    }

    async fn evaluate_pre_compact(&self, msg: &PreCompactMessage) -> RuleResult {
        first_response!(&self.engines, evaluate_pre_compact, msg)
    }
}
