//! Decoding of hook messages and encoding of responses

use serde_json::{Deserializer, Value};

use super::messages::{HookEventName, HookMessage, HookResponse};
use super::HookError;

/// Parses a single hook message, dispatching on `hook_event_name`.
///
/// # Errors
/// - `HookError::Parse` - Input is not a JSON object or lacks an event name
/// - `HookError::UnknownEvent` - Event name is not part of the protocol
pub fn parse_hook_message(data: &[u8]) -> Result<HookMessage, HookError> {
    let value: Value = serde_json::from_slice(data).map_err(|e| HookError::Parse {
        reason: e.to_string(),
    })?;
    parse_hook_value(value)
}

fn parse_hook_value(value: Value) -> Result<HookMessage, HookError> {
    let event = value
        .get("hook_event_name")
        .and_then(Value::as_str)
        .ok_or_else(|| HookError::Parse {
            reason: "missing hook_event_name".to_string(),
        })?;

    // Reject unknown events before attempting a full decode
    let event: HookEventName = event.parse()?;

    serde_json::from_value(value).map_err(|e| HookError::Parse {
        reason: format!("invalid {event} message: {e}"),
    })
}

/// Parses a stream of concatenated or newline-separated hook messages.
///
/// # Errors
/// Returns the first decoding failure encountered.
pub fn parse_multiple(data: &[u8]) -> Result<Vec<HookMessage>, HookError> {
    Deserializer::from_slice(data)
        .into_iter::<Value>()
        .map(|value| {
            let value = value.map_err(|e| HookError::Parse {
                reason: e.to_string(),
            })?;
            parse_hook_value(value)
        })
        .collect()
}

/// Parses a hook response.
///
/// # Errors
/// Returns `HookError::Parse` if the data is not a valid response object.
pub fn parse_hook_response(data: &[u8]) -> Result<HookResponse, HookError> {
    serde_json::from_slice(data).map_err(|e| HookError::Parse {
        reason: format!("invalid hook response: {e}"),
    })
}

/// Serializes a hook response as a single JSON line.
///
/// # Errors
/// Returns `HookError::Json` if serialization fails.
pub fn marshal_hook_response(response: &HookResponse) -> Result<Vec<u8>, HookError> {
    let mut data = serde_json::to_vec(response)?;
    data.push(b'\n');
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::messages::Decision;

    const PRE_TOOL_USE: &str = r#"{
        "session_id": "abc123",
        "transcript_path": "/tmp/transcript.jsonl",
        "hook_event_name": "PreToolUse",
        "tool_name": "Write",
        "tool_input": {"file_path": "/tmp/a.py", "content": "x = 1\n"}
    }"#;

    #[test]
    fn test_parse_pre_tool_use() {
        let msg = parse_hook_message(PRE_TOOL_USE.as_bytes()).unwrap();
        match msg {
            HookMessage::PreToolUse(m) => {
                assert_eq!(m.tool_name, "Write");
                assert_eq!(m.session.session_id, "abc123");
                assert_eq!(m.tool_input["file_path"], "/tmp/a.py");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_each_event_type() {
        let cases = [
            (
                r#"{"hook_event_name":"PostToolUse","tool_name":"Edit","tool_input":{}}"#,
                HookEventName::PostToolUse,
            ),
            (
                r#"{"hook_event_name":"Notification","notification_type":"info","message":"hi"}"#,
                HookEventName::Notification,
            ),
            (
                r#"{"hook_event_name":"Stop","reason":"done"}"#,
                HookEventName::Stop,
            ),
            (
                r#"{"hook_event_name":"SubagentStop","subagent_id":"1","subagent_name":"x"}"#,
                HookEventName::SubagentStop,
            ),
            (
                r#"{"hook_event_name":"PreCompact","current_tokens":10,"target_tokens":5}"#,
                HookEventName::PreCompact,
            ),
        ];

        for (input, expected) in cases {
            let msg = parse_hook_message(input.as_bytes()).unwrap();
            assert_eq!(msg.event_name(), expected);
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let err = parse_hook_message(br#"{"hook_event_name":"Bogus"}"#).unwrap_err();
        assert!(matches!(err, HookError::UnknownEvent { name } if name == "Bogus"));
    }

    #[test]
    fn test_missing_event_and_bad_json() {
        assert!(matches!(
            parse_hook_message(br#"{"tool_name":"Write"}"#),
            Err(HookError::Parse { .. })
        ));
        assert!(matches!(
            parse_hook_message(b"not json"),
            Err(HookError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_multiple_messages() {
        let input = format!(
            "{}\n{}\n",
            r#"{"hook_event_name":"Stop"}"#,
            r#"{"hook_event_name":"Notification","message":"m"}"#
        );
        let messages = parse_multiple(input.as_bytes()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].event_name(), HookEventName::Stop);
        assert_eq!(messages[1].event_name(), HookEventName::Notification);

        let broken = r#"{"hook_event_name":"Stop"} {"hook_event_name":"#;
        assert!(parse_multiple(broken.as_bytes()).is_err());
    }

    #[test]
    fn test_marshal_response_appends_newline() {
        let data = marshal_hook_response(&HookResponse::block("nope")).unwrap();
        assert!(data.ends_with(b"\n"));

        let parsed = parse_hook_response(&data).unwrap();
        assert_eq!(parsed.decision, Some(Decision::Block));
        assert_eq!(parsed.reason.as_deref(), Some("nope"));
    }
}
