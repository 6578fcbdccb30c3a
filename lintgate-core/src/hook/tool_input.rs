//! Typed views over the `tool_input` object of tool-use events

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::HookError;

/// Input of a tool invocation, decoded by tool name.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Write {
        file_path: String,
        content: String,
    },
    Edit {
        file_path: String,
        old_string: String,
        new_string: String,
        replace_all: bool,
    },
    MultiEdit {
        file_path: String,
        edits: Vec<EditOperation>,
    },
    Bash {
        command: String,
        description: Option<String>,
        timeout: Option<u64>,
    },
    Read {
        file_path: String,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    /// Tools without a dedicated representation
    Other {
        name: String,
        parameters: Map<String, Value>,
    },
}

/// A single replacement inside a MultiEdit call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditOperation {
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

#[derive(Deserialize)]
struct WriteParams {
    file_path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct EditParams {
    file_path: String,
    #[serde(default)]
    old_string: String,
    #[serde(default)]
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[derive(Deserialize)]
struct MultiEditParams {
    file_path: String,
    #[serde(default)]
    edits: Vec<EditOperation>,
}

#[derive(Deserialize)]
struct BashParams {
    command: String,
    description: Option<String>,
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct ReadParams {
    file_path: String,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl ToolInput {
    /// Decodes tool parameters into the variant matching `tool_name`.
    ///
    /// # Errors
    /// Returns `HookError::InvalidToolInput` when a known tool carries
    /// parameters of the wrong shape.
    pub fn parse(tool_name: &str, parameters: &Map<String, Value>) -> Result<Self, HookError> {
        let input = match tool_name {
            "Write" => {
                let p: WriteParams = decode(tool_name, parameters)?;
                ToolInput::Write {
                    file_path: p.file_path,
                    content: p.content,
                }
            }
            "Edit" => {
                let p: EditParams = decode(tool_name, parameters)?;
                ToolInput::Edit {
                    file_path: p.file_path,
                    old_string: p.old_string,
                    new_string: p.new_string,
                    replace_all: p.replace_all,
                }
            }
            "MultiEdit" => {
                let p: MultiEditParams = decode(tool_name, parameters)?;
                ToolInput::MultiEdit {
                    file_path: p.file_path,
                    edits: p.edits,
                }
            }
            "Bash" => {
                let p: BashParams = decode(tool_name, parameters)?;
                ToolInput::Bash {
                    command: p.command,
                    description: p.description,
                    timeout: p.timeout,
                }
            }
            "Read" => {
                let p: ReadParams = decode(tool_name, parameters)?;
                ToolInput::Read {
                    file_path: p.file_path,
                    limit: p.limit,
                    offset: p.offset,
                }
            }
            other => ToolInput::Other {
                name: other.to_string(),
                parameters: parameters.clone(),
            },
        };
        Ok(input)
    }

    /// Name of the tool this input belongs to.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolInput::Write { .. } => "Write",
            ToolInput::Edit { .. } => "Edit",
            ToolInput::MultiEdit { .. } => "MultiEdit",
            ToolInput::Bash { .. } => "Bash",
            ToolInput::Read { .. } => "Read",
            ToolInput::Other { name, .. } => name,
        }
    }

    /// Target file of file-oriented tools.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            ToolInput::Write { file_path, .. }
            | ToolInput::Edit { file_path, .. }
            | ToolInput::MultiEdit { file_path, .. }
            | ToolInput::Read { file_path, .. } => {
                (!file_path.is_empty()).then(|| Path::new(file_path.as_str()))
            }
            _ => None,
        }
    }

    /// True for tools that change file contents on disk.
    pub fn is_file_modification(&self) -> bool {
        matches!(
            self,
            ToolInput::Write { .. } | ToolInput::Edit { .. } | ToolInput::MultiEdit { .. }
        )
    }
}

fn decode<T: DeserializeOwned>(
    tool: &str,
    parameters: &Map<String, Value>,
) -> Result<T, HookError> {
    serde_json::from_value(Value::Object(parameters.clone())).map_err(|e| {
        HookError::InvalidToolInput {
            tool: tool.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_write_input() {
        let input = ToolInput::parse(
            "Write",
            &params(json!({"file_path": "/src/a.py", "content": "print(1)\n"})),
        )
        .unwrap();

        assert_eq!(input.file_path(), Some(Path::new("/src/a.py")));
        assert!(input.is_file_modification());
        assert!(matches!(input, ToolInput::Write { ref content, .. } if content == "print(1)\n"));
    }

    #[test]
    fn test_parse_multi_edit_input() {
        let input = ToolInput::parse(
            "MultiEdit",
            &params(json!({
                "file_path": "/src/a.md",
                "edits": [
                    {"old_string": "a", "new_string": "b"},
                    {"old_string": "c", "new_string": "d", "replace_all": true}
                ]
            })),
        )
        .unwrap();

        match input {
            ToolInput::MultiEdit { edits, .. } => {
                assert_eq!(edits.len(), 2);
                assert!(!edits[0].replace_all);
                assert!(edits[1].replace_all);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn test_bash_has_no_file_path() {
        let input = ToolInput::parse("Bash", &params(json!({"command": "ls"}))).unwrap();
        assert_eq!(input.file_path(), None);
        assert!(!input.is_file_modification());
        assert_eq!(input.tool_name(), "Bash");
    }

    #[test]
    fn test_unknown_tool_keeps_parameters() {
        let input = ToolInput::parse("Glob", &params(json!({"pattern": "*.rs"}))).unwrap();
        match input {
            ToolInput::Other { name, parameters } => {
                assert_eq!(name, "Glob");
                assert_eq!(parameters["pattern"], "*.rs");
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_known_tool_is_an_error() {
        let err = ToolInput::parse("Write", &params(json!({"content": 5}))).unwrap_err();
        assert!(matches!(err, HookError::InvalidToolInput { tool, .. } if tool == "Write"));
    }

    #[test]
    fn test_empty_file_path_is_treated_as_missing() {
        let input = ToolInput::parse("Edit", &params(json!({"file_path": ""}))).unwrap();
        assert_eq!(input.file_path(), None);
    }
}
