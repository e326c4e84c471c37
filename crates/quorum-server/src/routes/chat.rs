//! Chat-completion endpoint: the request-level orchestrator.
//!
//! resolve task → run one deliberation pass → persist at the pre-stream
//! checkpoint → stream the chunk sequence. Persistence happens exactly
//! once, before any frame is emitted, so a cancelled stream never leaves
//! partially-applied task state.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use quorum_core::marker;
use quorum_core::model::Message;
use quorum_core::rounds::{RoundResult, RoundRunner};
use quorum_core::task::{Task, TaskState, TaskStore};

use crate::error::AppError;
use crate::streamer::{self, StreamIdentity};
use crate::types::{ChatCompletionChunk, ChatCompletionRequest};
use crate::AppState;

const SSE_CHANNEL_BUFFER: usize = 256;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat_completions))
}

async fn chat_completions(
    State(state): State<AppState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if !req.stream {
        return Err(AppError::BadRequest(
            "Only streaming requests are supported; set \"stream\": true".to_string(),
        ));
    }
    if req.messages.is_empty() {
        return Err(AppError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }
    let runner = state
        .runner
        .clone()
        .ok_or_else(|| AppError::BadRequest("No AI credentials configured".to_string()))?;

    let task = state.resolver.resolve(&req.messages, &req.tools)?;
    tracing::debug!(task_id = %task.id, state = ?task.state, "resolved task");

    let (sse_tx, sse_rx) = mpsc::channel::<Result<Event, Infallible>>(SSE_CHANNEL_BUFFER);

    // Client disconnect must propagate into the active agent call.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let watch_tx = sse_tx.clone();
        tokio::spawn(async move {
            watch_tx.closed().await;
            cancel.cancel();
        });
    }

    let store = state.store.clone();
    let model = state.model_name.as_ref().clone();

    tokio::spawn(async move {
        let identity = StreamIdentity::new(&model);
        if let Some(frames) = deliberate(&runner, &store, &identity, task, &cancel).await {
            streamer::emit(&sse_tx, frames).await;
        }
    });

    Ok(Sse::new(ReceiverStream::new(sse_rx)).keep_alive(KeepAlive::default()))
}

/// Run one pass, apply the result to the task, persist, and return the
/// frames to emit. Returns None when the pass was cancelled; nothing is
/// persisted past the last checkpoint in that case.
async fn deliberate(
    runner: &RoundRunner,
    store: &Arc<TaskStore>,
    identity: &StreamIdentity,
    mut task: Task,
    cancel: &CancellationToken,
) -> Option<Vec<ChatCompletionChunk>> {
    let result = runner.run(&task, cancel).await;
    if cancel.is_cancelled() {
        tracing::debug!(task_id = %task.id, "client disconnected during deliberation");
        return None;
    }

    let mark = marker::task_marker(&task.id);

    let frames = match result {
        RoundResult::ToolCalls { calls, agent } => {
            tracing::info!(task_id = %task.id, agent = %agent, count = calls.len(), "pausing for tool results");
            task.pending_tool_calls = calls.clone();
            task.last_active_agent = Some(agent);
            task.state = TaskState::AwaitingToolResult;
            task.messages
                .push(Message::assistant_tool_calls(calls.clone()));
            store.update(task.clone());

            streamer::tool_call_frames(identity, &calls, &mark)
        }
        RoundResult::Text { body, complete } => {
            tracing::info!(task_id = %task.id, complete, "round produced text");
            task.state = if complete {
                TaskState::Completed
            } else {
                TaskState::AwaitingUser
            };
            task.pending_tool_calls.clear();
            task.last_active_agent = None;
            task.messages
                .push(Message::assistant(marker::append_marker(&body, &task.id)));
            store.update(task.clone());

            streamer::text_frames(identity, &body, &mark)
        }
    };

    Some(frames)
}
