//! Deliberation round runner
//!
//! Drives one multi-agent pass: scheduler decision, agent generation,
//! transcript accumulation, tool-call interception. Bounded and
//! cancellable; a pass never hangs and never propagates scheduling
//! failures to the caller.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agents::AgentDirectory;
use crate::ai::streaming::{StreamPart, StreamToolCall};
use crate::model::{Message, Role, ToolCall};
use crate::scheduler::{Choice, Manager};
use crate::task::{Task, TaskState};

/// Hard cap on scheduler decisions per pass.
pub const MAX_ROUNDS: usize = 20;

/// Per-turn stream read timeout.
const TURN_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

const COMPLETED_TASK_TEXT: &str =
    "This task has already been completed. Start a new conversation to begin another one.";

const COMPLETION_BANNER: &str = "✅ The team has completed this task.";
const APPROVAL_BANNER: &str =
    "⏸️ The team is waiting on you. Reply to continue or adjust the direction.";

/// Outcome of one deliberation pass.
#[derive(Debug)]
pub enum RoundResult {
    Text { body: String, complete: bool },
    ToolCalls { calls: Vec<ToolCall>, agent: String },
}

enum TurnOutcome {
    Text(String),
    ToolCalls(Vec<StreamToolCall>),
    Cancelled,
}

pub struct RoundRunner {
    manager: Manager,
    directory: AgentDirectory,
}

impl RoundRunner {
    pub fn new(manager: Manager, directory: AgentDirectory) -> Self {
        Self { manager, directory }
    }

    /// Run one deliberation pass over the task's history.
    ///
    /// A completed task short-circuits without touching the scheduler or
    /// any agent. Otherwise the pass ends on AwaitUser/Complete, on the
    /// first tool-call batch, on cancellation, or at the round bound.
    pub async fn run(&self, task: &Task, cancel: &CancellationToken) -> RoundResult {
        if task.state == TaskState::Completed {
            return RoundResult::Text {
                body: COMPLETED_TASK_TEXT.to_string(),
                complete: true,
            };
        }

        let mut working = task.messages.clone();
        if let Some(agent) = &task.last_active_agent {
            if task.messages.iter().any(|m| m.role == Role::Tool) {
                // Resumption bias: the agent that requested the tools is the
                // natural one to read their results.
                working.push(Message::system(format!(
                    "The tool results above were requested by {agent}; that agent should normally continue."
                )));
            }
        }

        let mut transcript: Vec<(String, String)> = Vec::new();
        let mut buffer = String::new();
        let mut current_agent: Option<String> = None;

        for round in 0..MAX_ROUNDS {
            if cancel.is_cancelled() {
                debug!(round, task_id = %task.id, "deliberation cancelled");
                break;
            }

            let decision = self.manager.select_next(&working).await;
            debug!(round, task_id = %task.id, choice = ?decision.choice, reasoning = %decision.reasoning, "scheduler decision");

            let agent_name = match decision.choice {
                Choice::AwaitUser => {
                    flush(&mut transcript, current_agent.as_deref(), &mut buffer);
                    return RoundResult::Text {
                        body: render_transcript(&transcript, false),
                        complete: false,
                    };
                }
                Choice::Complete => {
                    flush(&mut transcript, current_agent.as_deref(), &mut buffer);
                    return RoundResult::Text {
                        body: render_transcript(&transcript, true),
                        complete: true,
                    };
                }
                Choice::Speak(name) => name,
            };

            if current_agent.as_deref() != Some(agent_name.as_str()) {
                flush(&mut transcript, current_agent.as_deref(), &mut buffer);
                current_agent = Some(agent_name.clone());
            }

            let Some(agent) = self.directory.get(&agent_name) else {
                warn!(agent = %agent_name, "scheduler chose an unknown agent; skipping round");
                continue;
            };

            let rx = match agent.stream(&working, &task.tools).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(agent = %agent_name, "agent call failed: {:#}", e);
                    continue;
                }
            };

            match consume_stream(rx, cancel).await {
                TurnOutcome::ToolCalls(raw_calls) => {
                    // Tool calls preempt everything else this pass; the
                    // caller executes them and resumes with the results.
                    return RoundResult::ToolCalls {
                        calls: repair_tool_calls(raw_calls),
                        agent: agent_name,
                    };
                }
                TurnOutcome::Text(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if !buffer.is_empty() {
                            buffer.push_str("\n\n");
                        }
                        buffer.push_str(trimmed);
                        working.push(Message::assistant(trimmed).with_author(agent_name.as_str()));
                    }
                }
                TurnOutcome::Cancelled => {
                    debug!(round, task_id = %task.id, "agent turn cancelled");
                    break;
                }
            }
        }

        flush(&mut transcript, current_agent.as_deref(), &mut buffer);
        RoundResult::Text {
            body: render_transcript(&transcript, false),
            complete: false,
        }
    }
}

/// Consume one agent turn. Any tool-call completion stops consumption:
/// whatever arrived alongside it is drained, then the receiver is dropped,
/// aborting the in-flight generation.
async fn consume_stream(
    mut rx: mpsc::UnboundedReceiver<StreamPart>,
    cancel: &CancellationToken,
) -> TurnOutcome {
    let mut text = String::new();
    let mut calls: Vec<StreamToolCall> = Vec::new();

    loop {
        let part = tokio::select! {
            _ = cancel.cancelled() => return TurnOutcome::Cancelled,
            received = tokio::time::timeout(TURN_STREAM_TIMEOUT, rx.recv()) => match received {
                Ok(Some(part)) => part,
                Ok(None) => break,
                Err(_) => {
                    warn!("agent stream timeout; treating turn as finished");
                    break;
                }
            },
        };

        match part {
            StreamPart::TextDelta { delta } => text.push_str(&delta),
            StreamPart::ToolCallStart { .. } => {}
            StreamPart::ToolCallComplete { tool_call } => {
                calls.push(tool_call);
                while let Ok(part) = rx.try_recv() {
                    if let StreamPart::ToolCallComplete { tool_call } = part {
                        calls.push(tool_call);
                    }
                }
                return TurnOutcome::ToolCalls(calls);
            }
            StreamPart::Finish { .. } => break,
            StreamPart::Error { error } => {
                warn!("agent stream error: {}", error);
                break;
            }
        }
    }

    if calls.is_empty() {
        TurnOutcome::Text(text)
    } else {
        TurnOutcome::ToolCalls(calls)
    }
}

/// Convert stream calls to wire calls, synthesizing ids where the provider
/// omitted them and flattening arguments to JSON strings.
fn repair_tool_calls(raw: Vec<StreamToolCall>) -> Vec<ToolCall> {
    raw.into_iter()
        .map(|call| {
            let id = if call.id.is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                call.id
            };
            let arguments =
                serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".to_string());
            ToolCall::function(id, call.name, arguments)
        })
        .collect()
}

fn flush(transcript: &mut Vec<(String, String)>, agent: Option<&str>, buffer: &mut String) {
    let text = std::mem::take(buffer);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    if let Some(name) = agent {
        transcript.push((name.to_string(), trimmed.to_string()));
    }
}

/// Render the accumulated transcript: per-agent headings, then a separator
/// and a status banner.
pub fn render_transcript(transcript: &[(String, String)], complete: bool) -> String {
    let mut body = String::new();
    for (agent, text) in transcript {
        body.push_str(&format!("### {}\n\n{}\n\n", display_name(agent), text));
    }
    body.push_str("---\n");
    body.push_str(if complete {
        COMPLETION_BANNER
    } else {
        APPROVAL_BANNER
    });
    body
}

/// Human-friendly agent heading.
///
/// Runtime identifiers may carry a 32-hex deployment suffix
/// (`developer_9f86d081884c7d65...`); strip it before title-casing.
pub fn display_name(identifier: &str) -> String {
    let mut base = identifier;
    if identifier.len() > 32 {
        if let Some(pos) = identifier.rfind('_') {
            let suffix = &identifier[pos + 1..];
            if suffix.len() == 32 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
                base = &identifier[..pos];
            }
        }
    }

    base.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
