//! Parser for the agent's stream-json output.
//!
//! The agent emits one JSON object per line on stdout. Four envelope types
//! are recognized (`system`, `assistant`, `user`, `result`); anything else
//! is skipped. Non-JSON lines are passed through as [`AgentEvent::RawOutput`]
//! because the agent writes plain text on some error paths.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A single parsed event from the agent's stdout stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Session header emitted once at startup.
    SessionStart {
        session_id: String,
        model: String,
        tools: Vec<String>,
    },
    /// Assistant turn: content blocks plus token usage for the turn.
    Assistant {
        blocks: Vec<ContentBlock>,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Tool results echoed back on the user channel.
    ToolResults { results: Vec<ToolResultPayload> },
    /// Final execution stats for the session.
    SessionEnd {
        subtype: String,
        turns: u32,
        duration_ms: u64,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// A line that was not JSON at all.
    RawOutput { text: String },
}

/// A content block inside an assistant message. Block types other than
/// `text` and `tool_use` are dropped during parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
}

/// One tool result from a `user` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultPayload {
    pub tool_use_id: String,
    pub content: String,
    pub duration_ms: u64,
    pub truncated: bool,
}

/// A recognized envelope whose body did not match the expected shape.
/// One bad line must not tear down the session; callers log and continue.
#[derive(Debug, Error)]
#[error("malformed {envelope} envelope: {source}")]
pub struct ParseError {
    envelope: &'static str,
    #[source]
    source: serde_json::Error,
}

#[derive(Deserialize, Default)]
struct RawSystem {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    tools: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize, Default)]
struct RawAssistant {
    #[serde(default)]
    message: RawAssistantMessage,
}

#[derive(Deserialize, Default)]
struct RawAssistantMessage {
    #[serde(default)]
    content: Option<Vec<Value>>,
    #[serde(default)]
    usage: RawUsage,
}

#[derive(Deserialize, Default)]
struct RawUser {
    #[serde(default)]
    message: RawUserMessage,
    #[serde(default)]
    tool_use_result: RawToolUseResult,
}

#[derive(Deserialize, Default)]
struct RawUserMessage {
    #[serde(default)]
    content: Option<Vec<RawUserContent>>,
}

#[derive(Deserialize, Default)]
struct RawUserContent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    tool_use_id: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct RawToolUseResult {
    #[serde(default, rename = "durationMs")]
    duration_ms: u64,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize, Default)]
struct RawResult {
    #[serde(default)]
    subtype: String,
    #[serde(default)]
    num_turns: u32,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    usage: RawUsage,
}

/// Parse a single line of stream-json output.
///
/// Returns `Ok(Some(event))` for recognized envelopes and non-JSON lines,
/// `Ok(None)` for valid JSON with an unrecognized `type`, and `Err` when a
/// recognized envelope carries a malformed body.
pub fn parse_line(line: &str) -> Result<Option<AgentEvent>, ParseError> {
    let raw_output = || {
        Ok(Some(AgentEvent::RawOutput {
            text: line.to_string(),
        }))
    };

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        // Not JSON — surface the text as raw output.
        Err(_) => return raw_output(),
    };
    if !value.is_object() {
        return raw_output();
    }
    let kind = match value.get("type") {
        // Tagless object — skip silently.
        None => return Ok(None),
        Some(Value::String(kind)) => kind.clone(),
        // A non-string tag cannot be an envelope; treat like non-JSON.
        Some(_) => return raw_output(),
    };

    match kind.as_str() {
        "system" => parse_system(line).map(Some),
        "assistant" => parse_assistant(line).map(Some),
        "user" => parse_user(line).map(Some),
        "result" => parse_result(line).map(Some),
        // Unknown type (e.g. stream_event) — skip silently.
        _ => Ok(None),
    }
}

fn parse_system(line: &str) -> Result<AgentEvent, ParseError> {
    let raw: RawSystem = serde_json::from_str(line).map_err(|source| ParseError {
        envelope: "system",
        source,
    })?;
    Ok(AgentEvent::SessionStart {
        session_id: raw.session_id,
        model: raw.model,
        tools: raw.tools.unwrap_or_default(),
    })
}

fn parse_assistant(line: &str) -> Result<AgentEvent, ParseError> {
    let raw: RawAssistant = serde_json::from_str(line).map_err(|source| ParseError {
        envelope: "assistant",
        source,
    })?;

    let mut blocks = Vec::new();
    for value in raw.message.content.unwrap_or_default() {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            continue;
        };
        match kind {
            "text" => blocks.push(ContentBlock::Text {
                text: value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "tool_use" => blocks.push(ContentBlock::ToolUse {
                id: value
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: value
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                input: value
                    .get("input")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            }),
            _ => {}
        }
    }

    Ok(AgentEvent::Assistant {
        blocks,
        input_tokens: raw.message.usage.input_tokens,
        output_tokens: raw.message.usage.output_tokens,
    })
}

fn parse_user(line: &str) -> Result<AgentEvent, ParseError> {
    let raw: RawUser = serde_json::from_str(line).map_err(|source| ParseError {
        envelope: "user",
        source,
    })?;

    let results = raw
        .message
        .content
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| entry.kind == "tool_result")
        .map(|entry| ToolResultPayload {
            tool_use_id: entry.tool_use_id,
            content: entry.content,
            duration_ms: raw.tool_use_result.duration_ms,
            truncated: raw.tool_use_result.truncated,
        })
        .collect();

    Ok(AgentEvent::ToolResults { results })
}

fn parse_result(line: &str) -> Result<AgentEvent, ParseError> {
    let raw: RawResult = serde_json::from_str(line).map_err(|source| ParseError {
        envelope: "result",
        source,
    })?;
    Ok(AgentEvent::SessionEnd {
        subtype: raw.subtype,
        turns: raw.num_turns,
        duration_ms: raw.duration_ms,
        input_tokens: raw.usage.input_tokens,
        output_tokens: raw.usage.output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_envelope() {
        let line = r#"{"type":"system","session_id":"s1","model":"opus","tools":["Read","Bash"]}"#;
        let event = parse_line(line).unwrap().unwrap();
        assert_eq!(
            event,
            AgentEvent::SessionStart {
                session_id: "s1".to_string(),
                model: "opus".to_string(),
                tools: vec!["Read".to_string(), "Bash".to_string()],
            }
        );
    }

    #[test]
    fn system_null_tools_normalizes_to_empty() {
        let line = r#"{"type":"system","session_id":"s1","model":"opus","tools":null}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::SessionStart { tools, .. } => assert!(tools.is_empty()),
            other => panic!("expected SessionStart, got {:?}", other),
        }
    }

    #[test]
    fn parses_assistant_with_text_and_tool_use() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hi"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/x"}}],"usage":{"input_tokens":10,"output_tokens":5}}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::Assistant {
                blocks,
                input_tokens,
                output_tokens,
            } => {
                assert_eq!(input_tokens, 10);
                assert_eq!(output_tokens, 5);
                assert_eq!(blocks.len(), 2);
                assert_eq!(
                    blocks[0],
                    ContentBlock::Text {
                        text: "Hi".to_string()
                    }
                );
                match &blocks[1] {
                    ContentBlock::ToolUse { id, name, input } => {
                        assert_eq!(id, "t1");
                        assert_eq!(name, "Read");
                        assert_eq!(input.get("file_path").unwrap(), "/x");
                    }
                    other => panic!("expected ToolUse, got {:?}", other),
                }
            }
            other => panic!("expected Assistant, got {:?}", other),
        }
    }

    #[test]
    fn assistant_skips_unknown_block_types() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"ok"}],"usage":{"input_tokens":0,"output_tokens":0}}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::Assistant { blocks, .. } => {
                assert_eq!(blocks.len(), 1);
                assert_eq!(
                    blocks[0],
                    ContentBlock::Text {
                        text: "ok".to_string()
                    }
                );
            }
            other => panic!("expected Assistant, got {:?}", other),
        }
    }

    #[test]
    fn assistant_null_content_normalizes_to_empty() {
        let line = r#"{"type":"assistant","message":{"content":null,"usage":{"input_tokens":1,"output_tokens":2}}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::Assistant { blocks, .. } => assert!(blocks.is_empty()),
            other => panic!("expected Assistant, got {:?}", other),
        }
    }

    #[test]
    fn parses_user_tool_results() {
        let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]},"tool_use_result":{"durationMs":42,"truncated":false}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::ToolResults { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].tool_use_id, "t1");
                assert_eq!(results[0].content, "ok");
                assert_eq!(results[0].duration_ms, 42);
                assert!(!results[0].truncated);
            }
            other => panic!("expected ToolResults, got {:?}", other),
        }
    }

    #[test]
    fn user_filters_non_tool_result_content() {
        let line = r#"{"type":"user","message":{"content":[{"type":"text","content":"chatter"},{"type":"tool_result","tool_use_id":"t2","content":"done"}]}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::ToolResults { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].tool_use_id, "t2");
                assert_eq!(results[0].duration_ms, 0);
            }
            other => panic!("expected ToolResults, got {:?}", other),
        }
    }

    #[test]
    fn parses_result_envelope() {
        let line = r#"{"type":"result","subtype":"success","num_turns":7,"duration_ms":9001,"usage":{"input_tokens":100,"output_tokens":50}}"#;
        assert_eq!(
            parse_line(line).unwrap().unwrap(),
            AgentEvent::SessionEnd {
                subtype: "success".to_string(),
                turns: 7,
                duration_ms: 9001,
                input_tokens: 100,
                output_tokens: 50,
            }
        );
    }

    #[test]
    fn non_json_line_becomes_raw_output() {
        assert_eq!(
            parse_line("plain text error").unwrap().unwrap(),
            AgentEvent::RawOutput {
                text: "plain text error".to_string()
            }
        );
    }

    #[test]
    fn empty_line_becomes_empty_raw_output() {
        assert_eq!(
            parse_line("").unwrap().unwrap(),
            AgentEvent::RawOutput {
                text: String::new()
            }
        );
    }

    #[test]
    fn unknown_envelope_type_is_skipped() {
        assert_eq!(parse_line(r#"{"type":"stream_event","x":1}"#).unwrap(), None);
        assert_eq!(parse_line(r#"{"no_type":true}"#).unwrap(), None);
    }

    #[test]
    fn non_object_json_becomes_raw_output() {
        assert_eq!(
            parse_line(r#"["system"]"#).unwrap().unwrap(),
            AgentEvent::RawOutput {
                text: r#"["system"]"#.to_string()
            }
        );
        assert_eq!(
            parse_line(r#"{"type":123}"#).unwrap().unwrap(),
            AgentEvent::RawOutput {
                text: r#"{"type":123}"#.to_string()
            }
        );
    }

    #[test]
    fn malformed_recognized_envelope_is_an_error() {
        // `message` must be an object.
        let err = parse_line(r#"{"type":"assistant","message":"nope"}"#).unwrap_err();
        assert!(err.to_string().contains("assistant"));
    }

    #[test]
    fn round_trip_preserves_field_values() {
        let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"toolu_01AbC","content":"line1\nline2"}]},"tool_use_result":{"durationMs":1234,"truncated":true}}"#;
        match parse_line(line).unwrap().unwrap() {
            AgentEvent::ToolResults { results } => {
                assert_eq!(results[0].tool_use_id, "toolu_01AbC");
                assert_eq!(results[0].content, "line1\nline2");
                assert_eq!(results[0].duration_ms, 1234);
                assert!(results[0].truncated);
            }
            other => panic!("expected ToolResults, got {:?}", other),
        }
    }
}
