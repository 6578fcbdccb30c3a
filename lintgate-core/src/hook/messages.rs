//! Hook message and response wire types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::HookError;

/// Type of hook event delivered by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventName {
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubagentStop,
    PreCompact,
}

impl HookEventName {
    /// All event names in protocol order.
    pub const ALL: [HookEventName; 6] = [
        HookEventName::PreToolUse,
        HookEventName::PostToolUse,
        HookEventName::Notification,
        HookEventName::Stop,
        HookEventName::SubagentStop,
        HookEventName::PreCompact,
    ];

    /// Returns the wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEventName::PreToolUse => "PreToolUse",
            HookEventName::PostToolUse => "PostToolUse",
            HookEventName::Notification => "Notification",
            HookEventName::Stop => "Stop",
            HookEventName::SubagentStop => "SubagentStop",
            HookEventName::PreCompact => "PreCompact",
        }
    }
}

impl fmt::Display for HookEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEventName {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookEventName::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| HookError::UnknownEvent {
                name: s.to_string(),
            })
    }
}

/// Fields common to every hook message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
}

/// Sent before a tool is executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreToolUseMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Map<String, Value>,
}

/// Sent after a tool has been executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostToolUseMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Map<String, Value>,
    #[serde(
        default,
        alias = "tool_response",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_error: Option<String>,
}

/// System notification forwarded by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    #[serde(default)]
    pub notification_type: String,
    #[serde(default)]
    pub message: String,
}

/// Sent when the main agent finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_message: Option<String>,
}

/// Sent when a subagent completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubagentStopMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    #[serde(default)]
    pub subagent_id: String,
    #[serde(default)]
    pub subagent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Sent before the agent compresses its context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreCompactMessage {
    #[serde(flatten)]
    pub session: SessionInfo,
    #[serde(default)]
    pub current_tokens: u64,
    #[serde(default)]
    pub target_tokens: u64,
}

/// A decoded hook message of any event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookMessage {
    PreToolUse(PreToolUseMessage),
    PostToolUse(PostToolUseMessage),
    Notification(NotificationMessage),
    Stop(StopMessage),
    SubagentStop(SubagentStopMessage),
    PreCompact(PreCompactMessage),
}

impl HookMessage {
    /// Event type of this message.
    pub fn event_name(&self) -> HookEventName {
        match self {
            HookMessage::PreToolUse(_) => HookEventName::PreToolUse,
            HookMessage::PostToolUse(_) => HookEventName::PostToolUse,
            HookMessage::Notification(_) => HookEventName::Notification,
            HookMessage::Stop(_) => HookEventName::Stop,
            HookMessage::SubagentStop(_) => HookEventName::SubagentStop,
            HookMessage::PreCompact(_) => HookEventName::PreCompact,
        }
    }

    /// Session fields shared by all message types.
    pub fn session(&self) -> &SessionInfo {
        match self {
            HookMessage::PreToolUse(m) => &m.session,
            HookMessage::PostToolUse(m) => &m.session,
            HookMessage::Notification(m) => &m.session,
            HookMessage::Stop(m) => &m.session,
            HookMessage::SubagentStop(m) => &m.session,
            HookMessage::PreCompact(m) => &m.session,
        }
    }

    /// Tool name for tool-use events.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            HookMessage::PreToolUse(m) => Some(&m.tool_name),
            HookMessage::PostToolUse(m) => Some(&m.tool_name),
            _ => None,
        }
    }
}

/// Decision attached to a PreToolUse (or blocking PostToolUse) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Block,
}

/// Response written back to the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continue_processing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HookResponse {
    /// Response approving a tool use.
    pub fn approve() -> Self {
        Self {
            decision: Some(Decision::Approve),
            ..Self::default()
        }
    }

    /// Response blocking a tool use with a reason shown to the agent.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Some(Decision::Block),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Attaches a user-visible message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.decision == Some(Decision::Block)
    }

    /// True when any field carries information for the agent.
    pub fn has_feedback(&self) -> bool {
        self.message.is_some()
            || self.reason.is_some()
            || self.stop_reason.is_some()
            || self.decision.is_some()
            || self.continue_processing.is_some()
            || self.suppress_output.is_some()
    }

    /// Text to surface on stderr: the reason, falling back to the message.
    pub fn feedback_text(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .or(self.message.as_deref())
            .or(self.stop_reason.as_deref())
    }
}

/// Exit status of the hook process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Stdout is shown in the transcript
    Success = 0,
    /// Stderr is shown to the user only
    NonBlocking = 1,
    /// Stderr is fed back to the agent
    Blocking = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_round_trips_through_str() {
        for event in HookEventName::ALL {
            assert_eq!(event.as_str().parse::<HookEventName>().unwrap(), event);
        }
        assert!(matches!(
            "Bogus".parse::<HookEventName>(),
            Err(HookError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn test_response_omits_unset_fields() {
        let json = serde_json::to_string(&HookResponse::approve()).unwrap();
        assert_eq!(json, r#"{"decision":"approve"}"#);

        let json = serde_json::to_string(&HookResponse::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_response_uses_protocol_field_names() {
        let response = HookResponse {
            continue_processing: Some(false),
            stop_reason: Some("done".to_string()),
            suppress_output: Some(true),
            ..HookResponse::default()
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["continue"], false);
        assert_eq!(value["stopReason"], "done");
        assert_eq!(value["suppressOutput"], true);
    }

    #[test]
    fn test_feedback_detection() {
        assert!(!HookResponse::default().has_feedback());
        assert!(HookResponse::approve().has_feedback());

        let blocked = HookResponse::block("bad file");
        assert!(blocked.is_blocking());
        assert_eq!(blocked.feedback_text(), Some("bad file"));

        let informative = HookResponse::default().with_message("2 warnings");
        assert!(!informative.is_blocking());
        assert_eq!(informative.feedback_text(), Some("2 warnings"));
    }

    #[test]
    fn test_post_tool_use_accepts_tool_response_alias() {
        let msg: PostToolUseMessage = serde_json::from_str(
            r#"{"session_id":"s","transcript_path":"t","tool_name":"Write",
                "tool_input":{},"tool_response":{"success":true}}"#,
        )
        .unwrap();
        assert_eq!(msg.tool_output, Some(serde_json::json!({"success": true})));
        assert_eq!(msg.session.session_id, "s");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::NonBlocking.code(), 1);
        assert_eq!(ExitCode::Blocking.code(), 2);
    }
}
