//! Streaming events from the generation backend

use serde_json::Value;

/// A completed tool call extracted from a provider stream.
#[derive(Debug, Clone)]
pub struct StreamToolCall {
    /// Provider-assigned call id; empty when the provider omitted one.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One event from a streaming generation call.
#[derive(Debug, Clone)]
pub enum StreamPart {
    TextDelta { delta: String },
    ToolCallStart { id: String, name: String },
    ToolCallComplete { tool_call: StreamToolCall },
    Finish { reason: FinishReason },
    Error { error: String },
}

/// Finish reasons for model generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}
