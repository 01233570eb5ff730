//! The `tool_calls` command envelope.
//!
//! ```json
//! {"tool_calls":[{"func":"talk","params":{"input":"Ask Zeus about thunder"}}]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One entry of `tool_calls`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub func: String,
    #[serde(default)]
    pub params: Value,
}

/// What a tool call asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Talk { input: String },
    Initialize,
    Shutdown,
    Unknown(String),
}

impl ToolCall {
    pub fn command(&self) -> Command {
        match self.func.as_str() {
            "talk" => Command::Talk {
                input: talk_input(&self.params),
            },
            "initialize" => Command::Initialize,
            "shutdown" => Command::Shutdown,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// The tool calls in an envelope, in order.
///
/// Entries that are not valid tool calls are logged and dropped; a missing
/// or non-array `tool_calls` yields none.
pub fn tool_calls(envelope: &Value) -> Vec<ToolCall> {
    let Some(calls) = envelope.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| match ToolCall::deserialize(call) {
            Ok(call) => Some(call),
            Err(e) => {
                warn!(error = %e, call = %call, "Skipping malformed tool call");
                None
            }
        })
        .collect()
}

/// The user text of a `talk` call.
///
/// Accepts `{input}`, `{properties: {input}}` and `{properties: "<text>"}`.
pub fn talk_input(params: &Value) -> String {
    if let Some(input) = params.get("input").and_then(Value::as_str) {
        return input.to_string();
    }
    match params.get("properties") {
        Some(Value::String(input)) => input.clone(),
        Some(properties) => properties
            .get("input")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}
