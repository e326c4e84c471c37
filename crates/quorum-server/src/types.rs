//! Request and response types for the API

use serde::{Deserialize, Serialize};

use quorum_core::model::{Message, ToolDefinition};

// ============================================================================
// Chat Types
// ============================================================================

/// Inbound chat-completion request.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub stream: bool,
}

/// One `chat.completion.chunk` SSE frame. `id` and `created` are constant
/// across a response.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// `finish_reason` serializes as an explicit null on non-terminal frames.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCall {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<&'static str>,
    pub function: DeltaFunction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeltaFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

// ============================================================================
// Models Types
// ============================================================================

#[derive(Serialize)]
pub struct ModelsListResponse {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

#[derive(Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub owned_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_with_defaults() {
        let raw = json!({
            "model": "quorum-panel",
            "messages": [{"role": "user", "content": "Hi"}],
            "stream": true
        });
        let request: ChatCompletionRequest = serde_json::from_value(raw).unwrap();
        assert!(request.stream);
        assert!(request.tools.is_empty());
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn stream_defaults_to_false() {
        let raw = json!({"messages": []});
        let request: ChatCompletionRequest = serde_json::from_value(raw).unwrap();
        assert!(!request.stream);
    }

    #[test]
    fn non_terminal_frame_serializes_null_finish_reason() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-test".to_string(),
            object: "chat.completion.chunk",
            created: 1700000000,
            model: "quorum-panel".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    content: Some("Hello".to_string()),
                    ..Default::default()
                },
                finish_reason: None,
            }],
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["object"], "chat.completion.chunk");
        assert!(value["choices"][0]["finish_reason"].is_null());
        assert_eq!(value["choices"][0]["delta"]["content"], "Hello");
        assert!(value["choices"][0]["delta"].get("role").is_none());
    }

    #[test]
    fn terminal_frame_has_empty_delta() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-test".to_string(),
            object: "chat.completion.chunk",
            created: 1700000000,
            model: "quorum-panel".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some("stop"),
            }],
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["choices"][0]["delta"], json!({}));
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
    }
}
