//! Task records and lifecycle state

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::model::{Message, ToolCall, ToolDefinition};

mod resolver;
mod store;

pub use resolver::{ResolveError, TaskResolver};
pub use store::TaskStore;

/// Length of the external correlation handle.
pub const TASK_ID_LEN: usize = 8;

/// Deliberation session lifecycle state. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Created,
    Working,
    AwaitingUser,
    AwaitingToolResult,
    Completed,
}

/// One multi-turn deliberation session.
///
/// `messages` is the authoritative history *as last supplied by the
/// caller*: continuations replace it wholesale, they never append.
/// Invariant: `pending_tool_calls` is non-empty iff the state is
/// `AwaitingToolResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub state: TaskState,
    pub messages: Vec<Message>,
    pub pending_tool_calls: Vec<ToolCall>,
    /// Agent that last emitted tool calls, used to bias context on
    /// resumption.
    pub last_active_agent: Option<String>,
    /// Function declarations the caller made available, carried forward
    /// across turns.
    pub tools: Vec<ToolDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: generate_task_id(),
            state: TaskState::Created,
            messages: Vec::new(),
            pending_tool_calls: Vec::new(),
            last_active_agent: None,
            tools: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an 8-character alphanumeric task id.
pub fn generate_task_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TASK_ID_LEN)
        .map(char::from)
        .collect()
}
