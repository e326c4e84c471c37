//! Task resolution
//!
//! Maps an inbound request onto a task record: fresh session, plain
//! continuation, or tool-result resumption. The caller resends the full
//! conversation on every request, so continuation *replaces* the stored
//! history; appending here would duplicate turns.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::marker;
use crate::model::{Message, Role, ToolDefinition};
use crate::task::{Task, TaskState, TaskStore};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The request referenced a task the store has no record of. The
    /// session cannot be resumed without its context, so this is fatal to
    /// the request.
    #[error("task {0} not found")]
    TaskNotFound(String),
}

pub struct TaskResolver {
    store: Arc<TaskStore>,
}

impl TaskResolver {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    pub fn resolve(
        &self,
        inbound: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Task, ResolveError> {
        let Some(task_id) = marker::extract_task_id(inbound) else {
            return Ok(self.create_task(inbound, tools));
        };

        let mut task = self
            .store
            .get(&task_id)
            .ok_or(ResolveError::TaskNotFound(task_id))?;

        task.messages = strip_system(inbound);

        if task.state == TaskState::Completed {
            // Terminal: history still reconciled so the runner can render
            // its short-circuit response, but the state is left untouched.
            return Ok(task);
        }

        let has_tool_results = inbound.iter().any(|m| m.role == Role::Tool);
        let resuming = has_tool_results && task.state == TaskState::AwaitingToolResult;
        if !resuming {
            // Plain user continuation: any stale pause bookkeeping is void.
            task.pending_tool_calls.clear();
            task.last_active_agent = None;
        }

        if !tools.is_empty() {
            task.tools = tools.to_vec();
        }

        task.state = TaskState::Working;
        debug!(task_id = %task.id, resuming, "resolved continuation");
        Ok(task)
    }

    fn create_task(&self, inbound: &[Message], tools: &[ToolDefinition]) -> Task {
        let mut task = Task::new();
        if let Some(last_user) = inbound.iter().rev().find(|m| m.role == Role::User) {
            task.messages.push(last_user.clone());
        }
        task.tools = tools.to_vec();
        task.state = TaskState::Working;
        self.store.create(task.clone());
        debug!(task_id = %task.id, "created task");
        task
    }
}

fn strip_system(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCall;

    fn resolver() -> (Arc<TaskStore>, TaskResolver) {
        let store = Arc::new(TaskStore::new());
        (store.clone(), TaskResolver::new(store))
    }

    fn tool_message(call_id: &str) -> Message {
        Message {
            role: Role::Tool,
            content: Some("file contents".to_string()),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.to_string()),
        }
    }

    #[test]
    fn fresh_session_seeds_latest_user_message() {
        let (store, resolver) = resolver();
        let inbound = vec![Message::user("first"), Message::user("second")];

        let task = resolver.resolve(&inbound, &[]).unwrap();
        assert_eq!(task.state, TaskState::Working);
        assert_eq!(task.messages.len(), 1);
        assert_eq!(task.messages[0].content.as_deref(), Some("second"));
        assert!(store.get(&task.id).is_some());
    }

    #[test]
    fn unknown_marker_is_fatal() {
        let (_store, resolver) = resolver();
        let inbound = vec![Message::assistant(marker::append_marker(
            "hello", "nOsUch1d",
        ))];

        let err = resolver.resolve(&inbound, &[]).unwrap_err();
        assert!(matches!(err, ResolveError::TaskNotFound(id) if id == "nOsUch1d"));
    }

    #[test]
    fn continuation_replaces_history_and_drops_system() {
        let (store, resolver) = resolver();
        let mut task = Task::new();
        task.state = TaskState::AwaitingUser;
        task.messages = vec![Message::user("old")];
        let id = task.id.clone();
        store.create(task);

        let inbound = vec![
            Message::system("client system prompt"),
            Message::user("Hi"),
            Message::assistant(marker::append_marker("reply", &id)),
            Message::user("continue"),
        ];
        let resolved = resolver.resolve(&inbound, &[]).unwrap();

        assert_eq!(resolved.id, id);
        assert_eq!(resolved.state, TaskState::Working);
        assert_eq!(resolved.messages.len(), 3);
        assert!(resolved.messages.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn plain_continuation_clears_pause_bookkeeping() {
        let (store, resolver) = resolver();
        let mut task = Task::new();
        task.state = TaskState::AwaitingToolResult;
        task.pending_tool_calls = vec![ToolCall::function("call_1", "read_file", "{}")];
        task.last_active_agent = Some("developer".to_string());
        let id = task.id.clone();
        store.create(task);

        // Continuation without tool-role messages is a plain user turn.
        let inbound = vec![
            Message::assistant(marker::append_marker("reply", &id)),
            Message::user("never mind, skip the file"),
        ];
        let resolved = resolver.resolve(&inbound, &[]).unwrap();

        assert!(resolved.pending_tool_calls.is_empty());
        assert_eq!(resolved.last_active_agent, None);
        assert_eq!(resolved.state, TaskState::Working);
    }

    #[test]
    fn tool_result_resumption_keeps_pending_calls() {
        let (store, resolver) = resolver();
        let mut task = Task::new();
        task.state = TaskState::AwaitingToolResult;
        task.pending_tool_calls = vec![ToolCall::function("call_1", "read_file", "{}")];
        task.last_active_agent = Some("developer".to_string());
        let id = task.id.clone();
        store.create(task);

        let inbound = vec![
            Message::assistant(marker::append_marker("reply", &id)),
            tool_message("call_1"),
        ];
        let resolved = resolver.resolve(&inbound, &[]).unwrap();

        assert_eq!(resolved.pending_tool_calls.len(), 1);
        assert_eq!(resolved.last_active_agent.as_deref(), Some("developer"));
        assert_eq!(resolved.state, TaskState::Working);
    }

    #[test]
    fn inbound_tools_overwrite_stored_tools() {
        let (store, resolver) = resolver();
        let mut task = Task::new();
        task.state = TaskState::AwaitingUser;
        let id = task.id.clone();
        store.create(task);

        let tools: Vec<ToolDefinition> = serde_json::from_value(serde_json::json!([
            {"type": "function", "function": {"name": "read_file"}}
        ]))
        .unwrap();
        let inbound = vec![
            Message::assistant(marker::append_marker("reply", &id)),
            Message::user("go on"),
        ];
        let resolved = resolver.resolve(&inbound, &tools).unwrap();

        assert_eq!(resolved.tools.len(), 1);
        assert_eq!(resolved.tools[0].function.name, "read_file");
    }

    #[test]
    fn completed_task_state_is_left_untouched() {
        let (store, resolver) = resolver();
        let mut task = Task::new();
        task.state = TaskState::Completed;
        let id = task.id.clone();
        store.create(task);

        let inbound = vec![
            Message::assistant(marker::append_marker("done", &id)),
            Message::user("more?"),
        ];
        let resolved = resolver.resolve(&inbound, &[]).unwrap();
        assert_eq!(resolved.state, TaskState::Completed);
    }
}
