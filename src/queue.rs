use crate::store::{self, TaskStore};
use crate::task::{Task, TaskKey, TaskSelector};

/// Priority-ordered task list for one scheduling domain.
///
/// Invariant: tasks are always in non-increasing priority order, stable
/// (FIFO) among equal priorities. Every mutating call re-serializes the
/// full queue back to the store.
#[derive(Debug)]
pub struct TaskQueue {
    domain: String,
    tasks: Vec<Task>,
}

impl TaskQueue {
    /// Rehydrates the queue from the store. Missing or corrupt storage
    /// yields an empty queue.
    pub fn load(domain: impl Into<String>, store: &dyn TaskStore) -> Self {
        let domain = domain.into();
        let mut tasks = store::load(store, &domain);
        sort_by_priority(&mut tasks);
        Self { domain, tasks }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, key: TaskKey) -> Option<&Task> {
        self.tasks.iter().find(|t| t.key == key)
    }

    pub fn get_mut(&mut self, key: TaskKey) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.key == key)
    }

    pub fn has_key(&self, key: TaskKey) -> bool {
        self.get(key).is_some()
    }

    pub fn has_kind(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.kind.name() == name)
    }

    /// Inserts before the first strictly lower-priority task, so equal
    /// priorities keep their insertion order, and persists.
    pub fn insert(&mut self, task: Task, store: &mut dyn TaskStore) {
        let pos = self
            .tasks
            .iter()
            .position(|t| t.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(pos, task);
        self.persist(store);
    }

    /// Removes every task matching the selector, persists, and returns the
    /// removed keys. No match is an empty vec, not an error.
    pub fn remove(&mut self, selector: &TaskSelector, store: &mut dyn TaskStore) -> Vec<TaskKey> {
        let mut removed = Vec::new();
        self.tasks.retain(|t| {
            if selector.matches(t) {
                removed.push(t.key);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.persist(store);
        }
        removed
    }

    /// Stable descending re-sort, run at the top of every dispatch pass.
    pub fn resort(&mut self) {
        sort_by_priority(&mut self.tasks);
    }

    pub fn persist(&self, store: &mut dyn TaskStore) {
        store::save(store, &self.domain, &self.tasks);
    }
}

fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
}
