//! Dispatch of decoded hook messages to the active rule engine

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use regex::Regex;

use super::messages::{HookEventName, HookMessage};
use crate::rules::{RuleEngine, RuleResult};

/// Routes hook messages to a swappable rule engine.
pub struct Handler {
    rule_engine: RwLock<Arc<dyn RuleEngine>>,
}

impl Handler {
    pub fn new(rule_engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            rule_engine: RwLock::new(rule_engine),
        }
    }

    /// Replaces the rule engine used for subsequent messages.
    pub fn set_rule_engine(&self, engine: Arc<dyn RuleEngine>) {
        *self.rule_engine.write() = engine;
    }

    /// Evaluates a message with the current rule engine.
    ///
    /// # Errors
    /// Propagates the rule engine's `HookError`.
    pub async fn process_message(&self, msg: &HookMessage) -> RuleResult {
        // Clone the engine out so the lock is not held across await points
        let engine = Arc::clone(&*self.rule_engine.read());

        tracing::debug!(
            event = %msg.event_name(),
            tool = ?msg.tool_name(),
            "Processing hook message"
        );

        match msg {
            HookMessage::PreToolUse(m) => engine.evaluate_pre_tool_use(m).await,
            HookMessage::PostToolUse(m) => engine.evaluate_post_tool_use(m).await,
            HookMessage::Notification(m) => engine.evaluate_notification(m).await,
            HookMessage::Stop(m) => engine.evaluate_stop(m).await,
            HookMessage::SubagentStop(m) => engine.evaluate_subagent_stop(m).await,
            HookMessage::PreCompact(m) => engine.evaluate_pre_compact(m).await,
        }
    }
}

/// Registration of a named hook for an event.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub name: String,
    pub event: HookEventName,
    /// Regex matched against the tool name; empty matches every tool
    pub tool_pattern: String,
    pub priority: i32,
    pub timeout: Duration,
}

impl HookConfig {
    pub fn new(name: impl Into<String>, event: HookEventName) -> Self {
        Self {
            name: name.into(),
            event,
            tool_pattern: String::new(),
            priority: 0,
            timeout: super::DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_tool_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tool_pattern = pattern.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Checks the tool pattern against a tool name. Invalid patterns never match.
    pub fn matches_tool(&self, tool_name: &str) -> bool {
        if self.tool_pattern.is_empty() {
            return true;
        }
        match Regex::new(&format!("^(?:{})$", self.tool_pattern)) {
            Ok(re) => re.is_match(tool_name),
            Err(e) => {
                tracing::warn!(hook = %self.name, "Invalid tool pattern: {e}");
                false
            }
        }
    }
}

/// Hook configurations grouped by event.
#[derive(Debug, Default)]
pub struct Registry {
    hooks: RwLock<HashMap<HookEventName, Vec<HookConfig>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, config: HookConfig) {
        self.hooks.write().entry(config.event).or_default().push(config);
    }

    /// Hooks registered for an event, highest priority first.
    pub fn hooks(&self, event: HookEventName) -> Vec<HookConfig> {
        let mut hooks = self.hooks.read().get(&event).cloned().unwrap_or_default();
        hooks.sort_by(|a, b| b.priority.cmp(&a.priority));
        hooks
    }

    /// Hooks for an event whose tool pattern accepts `tool_name`.
    pub fn matching(&self, event: HookEventName, tool_name: &str) -> Vec<HookConfig> {
        self.hooks(event)
            .into_iter()
            .filter(|hook| hook.matches_tool(tool_name))
            .collect()
    }

    /// All registered hooks, in no particular order.
    pub fn all(&self) -> Vec<HookConfig> {
        self.hooks.read().values().flatten().cloned().collect()
    }

    pub fn clear(&self) {
        self.hooks.write().clear();
    }
}
