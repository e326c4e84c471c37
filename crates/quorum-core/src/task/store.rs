//! Keyed, concurrency-safe task storage
//!
//! Tasks are never deleted here; eviction is an external concern. Access
//! across distinct task ids is safe; concurrent updates against the same
//! id are last-write-wins (see DESIGN.md).

use chrono::Utc;
use dashmap::DashMap;

use super::Task;

#[derive(Default)]
pub struct TaskStore {
    tasks: DashMap<String, Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Insert a freshly created task.
    pub fn create(&self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    /// Write back a mutated task, refreshing `updated_at`.
    pub fn update(&self, mut task: Task) {
        task.updated_at = Utc::now();
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use crate::task::TaskState;

    #[test]
    fn create_get_update() {
        let store = TaskStore::new();
        let task = Task::new();
        let id = task.id.clone();
        store.create(task);

        let mut loaded = store.get(&id).expect("stored task");
        assert_eq!(loaded.state, TaskState::Created);

        loaded.state = TaskState::Working;
        loaded.messages.push(Message::user("Hi"));
        store.update(loaded);

        let reloaded = store.get(&id).expect("stored task");
        assert_eq!(reloaded.state, TaskState::Working);
        assert_eq!(reloaded.messages.len(), 1);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[test]
    fn get_unknown_id_is_none() {
        let store = TaskStore::new();
        assert!(store.get("zzzzzzzz").is_none());
    }
}
