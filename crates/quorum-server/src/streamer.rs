//! Response streamer
//!
//! Renders a finished round into the exact chat-completion chunk sequence:
//! fixed-width content slices, tool-call argument fragmentation, and the
//! `[DONE]` terminator. Frame order is the contract; the pacing delay is a
//! cosmetic constant.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use tokio::sync::mpsc;

use quorum_core::model::ToolCall;

use crate::types::{ChatCompletionChunk, ChunkChoice, Delta, DeltaFunction, DeltaToolCall};

/// Width of each streamed content slice.
const TEXT_SLICE_CHARS: usize = 10;
/// Width of each streamed tool-argument slice.
const ARG_SLICE_CHARS: usize = 50;
/// Cosmetic inter-frame delay.
const FRAME_DELAY: Duration = Duration::from_millis(8);

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const DONE_FRAME: &str = "[DONE]";

/// Constant per-response identity shared by every frame.
pub struct StreamIdentity {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl StreamIdentity {
    pub fn new(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
        }
    }

    fn frame(&self, delta: Delta, finish_reason: Option<&'static str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// Frames for a plain text response: fixed-width content slices, one frame
/// holding exactly the marker, then the stop frame.
pub fn text_frames(
    identity: &StreamIdentity,
    body: &str,
    marker: &str,
) -> Vec<ChatCompletionChunk> {
    let mut frames = Vec::new();
    for slice in char_slices(body, TEXT_SLICE_CHARS) {
        frames.push(identity.frame(
            Delta {
                content: Some(slice),
                ..Default::default()
            },
            None,
        ));
    }
    frames.push(identity.frame(
        Delta {
            content: Some(marker.to_string()),
            ..Default::default()
        },
        None,
    ));
    frames.push(identity.frame(Delta::default(), Some("stop")));
    frames
}

/// Frames for a tool-call batch: leading role/marker frame, then per call
/// an introduction frame and its fragmented arguments, then the
/// `tool_calls` stop frame.
pub fn tool_call_frames(
    identity: &StreamIdentity,
    calls: &[ToolCall],
    marker: &str,
) -> Vec<ChatCompletionChunk> {
    let mut frames = Vec::new();
    frames.push(identity.frame(
        Delta {
            role: Some("assistant"),
            content: Some(marker.to_string()),
            ..Default::default()
        },
        None,
    ));

    for (index, call) in calls.iter().enumerate() {
        frames.push(identity.frame(
            Delta {
                tool_calls: Some(vec![DeltaToolCall {
                    index,
                    id: Some(call.id.clone()),
                    call_type: Some("function"),
                    function: DeltaFunction {
                        name: Some(call.function.name.clone()),
                        arguments: Some(String::new()),
                    },
                }]),
                ..Default::default()
            },
            None,
        ));

        for slice in char_slices(&call.function.arguments, ARG_SLICE_CHARS) {
            frames.push(identity.frame(
                Delta {
                    tool_calls: Some(vec![DeltaToolCall {
                        index,
                        id: None,
                        call_type: None,
                        function: DeltaFunction {
                            name: None,
                            arguments: Some(slice),
                        },
                    }]),
                    ..Default::default()
                },
                None,
            ));
        }
    }

    frames.push(identity.frame(Delta::default(), Some("tool_calls")));
    frames
}

/// Emit frames as SSE events with cosmetic pacing, ending with `[DONE]`.
/// Stops early once the client is gone.
pub async fn emit(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    frames: Vec<ChatCompletionChunk>,
) {
    for frame in frames {
        let event = match serde_json::to_string(&frame) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                tracing::error!("failed to serialize chunk: {}", e);
                continue;
            }
        };
        if tx.send(Ok(event)).await.is_err() {
            return;
        }
        tokio::time::sleep(FRAME_DELAY).await;
    }
    let _ = tx.send(Ok(Event::default().data(DONE_FRAME))).await;
}

/// Split on char boundaries into fixed-width slices.
fn char_slices(text: &str, width: usize) -> Vec<String> {
    let mut slices = Vec::new();
    let mut current = String::with_capacity(width);
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == width {
            slices.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        slices.push(current);
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> StreamIdentity {
        StreamIdentity::new("quorum-panel")
    }

    fn contents(frames: &[ChatCompletionChunk]) -> Vec<Option<String>> {
        frames
            .iter()
            .map(|f| f.choices[0].delta.content.clone())
            .collect()
    }

    #[test]
    fn text_frames_slice_at_ten_chars() {
        let frames = text_frames(&identity(), "abcdefghijklmnopqrstuvwxy", "<!-- task:AAAAAAAA -->");
        // 25 chars -> 3 slices, plus marker frame, plus stop frame.
        assert_eq!(frames.len(), 5);
        let contents = contents(&frames);
        assert_eq!(contents[0].as_deref(), Some("abcdefghij"));
        assert_eq!(contents[1].as_deref(), Some("klmnopqrst"));
        assert_eq!(contents[2].as_deref(), Some("uvwxy"));
        assert_eq!(contents[3].as_deref(), Some("<!-- task:AAAAAAAA -->"));
        assert_eq!(contents[4], None);
        assert_eq!(frames[4].choices[0].finish_reason, Some("stop"));
        assert!(frames[..4]
            .iter()
            .all(|f| f.choices[0].finish_reason.is_none()));
    }

    #[test]
    fn text_slicing_respects_multibyte_chars() {
        let body = "✅ done ✅ done ✅";
        let frames = text_frames(&identity(), body, "<!-- task:AAAAAAAA -->");
        let rebuilt: String = frames
            .iter()
            .take(frames.len() - 2)
            .filter_map(|f| f.choices[0].delta.content.clone())
            .collect();
        assert_eq!(rebuilt, body);
    }

    #[test]
    fn identity_is_constant_across_frames() {
        let identity = identity();
        let frames = text_frames(&identity, "hello world, panel here", "<!-- task:AAAAAAAA -->");
        assert!(frames.iter().all(|f| f.id == identity.id));
        assert!(frames.iter().all(|f| f.created == identity.created));
        assert!(frames.iter().all(|f| f.object == CHUNK_OBJECT));
    }

    #[test]
    fn tool_call_frames_fragment_arguments() {
        let arguments = format!(r#"{{"target_file":"{}"}}"#, "x".repeat(80));
        let call =
            quorum_core::model::ToolCall::function("call_1", "read_file", arguments.as_str());
        let frames = tool_call_frames(&identity(), &[call], "<!-- task:AAAAAAAA -->");

        // Leading role/marker frame.
        assert_eq!(frames[0].choices[0].delta.role, Some("assistant"));
        assert_eq!(
            frames[0].choices[0].delta.content.as_deref(),
            Some("<!-- task:AAAAAAAA -->")
        );

        // Introduction frame: id, type, name, empty arguments.
        let intro = frames[1].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(intro[0].index, 0);
        assert_eq!(intro[0].id.as_deref(), Some("call_1"));
        assert_eq!(intro[0].call_type, Some("function"));
        assert_eq!(intro[0].function.name.as_deref(), Some("read_file"));
        assert_eq!(intro[0].function.arguments.as_deref(), Some(""));

        // Argument frames: 50-char slices that concatenate exactly.
        let arg_frames = &frames[2..frames.len() - 1];
        let rebuilt: String = arg_frames
            .iter()
            .map(|f| {
                let calls = f.choices[0].delta.tool_calls.as_ref().unwrap();
                assert!(calls[0].id.is_none());
                calls[0].function.arguments.clone().unwrap()
            })
            .collect();
        assert_eq!(rebuilt, arguments);
        assert!(arg_frames[0].choices[0]
            .delta
            .tool_calls
            .as_ref()
            .unwrap()[0]
            .function
            .arguments
            .as_ref()
            .unwrap()
            .len()
            == 50);

        // Terminal frame.
        let last = frames.last().unwrap();
        assert_eq!(last.choices[0].finish_reason, Some("tool_calls"));
        assert!(last.choices[0].delta.tool_calls.is_none());
    }

    #[test]
    fn tool_call_frames_index_per_call() {
        let calls = vec![
            quorum_core::model::ToolCall::function("call_1", "read_file", "{}"),
            quorum_core::model::ToolCall::function("call_2", "list_dir", "{}"),
        ];
        let frames = tool_call_frames(&identity(), &calls, "<!-- task:AAAAAAAA -->");
        let indices: Vec<usize> = frames
            .iter()
            .filter_map(|f| f.choices[0].delta.tool_calls.as_ref())
            .map(|calls| calls[0].index)
            .collect();
        // intro + one arg slice per call.
        assert_eq!(indices, vec![0, 0, 1, 1]);
    }

    #[test]
    fn char_slices_empty_input_yields_no_slices() {
        assert!(char_slices("", 10).is_empty());
    }
}
