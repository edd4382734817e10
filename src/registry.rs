use std::collections::BTreeMap;

use crate::agent::{Agent, AgentId};
use crate::colony::World;
use crate::queue::TaskQueue;
use crate::task::TaskKey;

/// Resolves a stable identifier to a live worker. Returning `None` is the
/// garbage-collection signal, never an error.
pub trait AgentLookup {
    fn resolve(&mut self, id: AgentId) -> Option<&mut Agent>;
}

impl AgentLookup for World {
    fn resolve(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agent_mut(id)
    }
}

impl AgentLookup for BTreeMap<AgentId, Agent> {
    fn resolve(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.get_mut(&id)
    }
}

/// Stored per tracked agent. `counted_affinity` remembers whether the
/// binding bumped the task's affinity sub-counter, so the decrement stays
/// correct even when the agent is gone by unbind time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Binding {
    pub task: Option<TaskKey>,
    counted_affinity: bool,
}

/// Verdict of a `live_agents` filter for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Include, binding untouched.
    Keep,
    /// Include and clear the binding (the dispatcher's free-worker query).
    Free,
    Skip,
}

/// Tracks which worker is bound to which task for one scheduling domain.
/// Bindings whose worker no longer exists are dropped lazily whenever the
/// registry is queried.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    bindings: BTreeMap<AgentId, Binding>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the agent has an (idle) entry.
    pub fn track(&mut self, id: AgentId) {
        self.bindings.entry(id).or_default();
    }

    pub fn bound_task(&self, id: AgentId) -> Option<TaskKey> {
        self.bindings.get(&id).and_then(|b| b.task)
    }

    pub fn tracked(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.bindings.keys().copied()
    }

    /// Binds the agent to a task and increments its counters. Called only
    /// from the dispatcher's assignment step.
    pub fn bind(&mut self, id: AgentId, key: TaskKey, counts_affinity: bool, queue: &mut TaskQueue) {
        let binding = self.bindings.entry(id).or_default();
        binding.task = Some(key);
        binding.counted_affinity = counts_affinity;
        if let Some(task) = queue.get_mut(key) {
            task.bound = task.bound.saturating_add(1);
            if counts_affinity {
                task.affinity_bound = task.affinity_bound.saturating_add(1);
            }
        }
    }

    /// Clears the agent's binding and decrements the counters on whatever
    /// task it had been bound to. Safe with no prior binding.
    pub fn unbind(&mut self, id: AgentId, queue: &mut TaskQueue) {
        let Some(binding) = self.bindings.get_mut(&id) else {
            return;
        };
        let old = std::mem::take(binding);
        release_counters(old, queue);
    }

    /// Clears every binding that points at one of the removed tasks. The
    /// tasks are already gone from the queue, so there are no counters
    /// left to touch.
    pub fn release_bound_to(&mut self, removed: &[TaskKey]) -> Vec<AgentId> {
        let mut released = Vec::new();
        for (id, binding) in &mut self.bindings {
            if let Some(key) = binding.task
                && removed.contains(&key)
            {
                *binding = Binding::default();
                released.push(*id);
            }
        }
        released
    }

    /// Iterates all tracked bindings in id order. Agents that no longer
    /// resolve are garbage-collected (counters decremented, entry dropped)
    /// and excluded; the filter decides inclusion for the rest and may
    /// free a binding as a side effect.
    pub fn live_agents<F>(
        &mut self,
        lookup: &mut dyn AgentLookup,
        queue: &mut TaskQueue,
        mut filter: F,
    ) -> Vec<AgentId>
    where
        F: FnMut(&Agent, Option<TaskKey>, &TaskQueue) -> Verdict,
    {
        let ids: Vec<AgentId> = self.bindings.keys().copied().collect();
        let mut out = Vec::new();
        for id in ids {
            let Some(agent) = lookup.resolve(id) else {
                self.drop_binding(id, queue);
                continue;
            };
            let binding = self.bindings.get(&id).copied().unwrap_or_default();
            match filter(agent, binding.task, queue) {
                Verdict::Keep => out.push(id),
                Verdict::Free => {
                    self.unbind(id, queue);
                    out.push(id);
                }
                Verdict::Skip => {}
            }
        }
        out
    }

    fn drop_binding(&mut self, id: AgentId, queue: &mut TaskQueue) {
        if let Some(binding) = self.bindings.remove(&id) {
            release_counters(binding, queue);
        }
    }
}

fn release_counters(binding: Binding, queue: &mut TaskQueue) {
    if let Some(key) = binding.task
        && let Some(task) = queue.get_mut(key)
    {
        task.bound = task.bound.saturating_sub(1);
        if binding.counted_affinity {
            task.affinity_bound = task.affinity_bound.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::task::{TaskKind, TaskSpec};

    fn queue_with_task(store: &mut MemStore, key: TaskKey) -> TaskQueue {
        let mut q = TaskQueue::load("c1", store);
        q.insert(
            TaskSpec::new(TaskKind::Build { site: 1 }, 5)
                .capacity(2)
                .into_task(key),
            store,
        );
        q
    }

    #[test]
    fn bind_and_unbind_keep_counters_in_step() {
        let mut store = MemStore::new();
        let mut q = queue_with_task(&mut store, 100);
        let mut reg = AgentRegistry::new();
        reg.bind(1, 100, false, &mut q);
        reg.bind(2, 100, true, &mut q);
        assert_eq!(q.get(100).map(|t| (t.bound, t.affinity_bound)), Some((2, 1)));
        reg.unbind(2, &mut q);
        assert_eq!(q.get(100).map(|t| (t.bound, t.affinity_bound)), Some((1, 0)));
        assert_eq!(reg.bound_task(2), None);
        // unbinding an unknown agent is a no-op
        reg.unbind(42, &mut q);
        assert_eq!(q.get(100).map(|t| t.bound), Some(1));
    }

    #[test]
    fn dead_agents_are_garbage_collected() {
        let mut store = MemStore::new();
        let mut q = queue_with_task(&mut store, 100);
        let mut agents: BTreeMap<AgentId, Agent> = BTreeMap::new();
        agents.insert(1, Agent::new(1));
        let mut reg = AgentRegistry::new();
        reg.bind(1, 100, false, &mut q);
        reg.bind(2, 100, false, &mut q); // agent 2 never existed in the world
        assert_eq!(q.get(100).map(|t| t.bound), Some(2));
        let live = reg.live_agents(&mut agents, &mut q, |_, _, _| Verdict::Keep);
        assert_eq!(live, vec![1]);
        assert_eq!(q.get(100).map(|t| t.bound), Some(1));
        assert_eq!(reg.bound_task(2), None);
    }

    #[test]
    fn free_verdict_clears_bindings() {
        let mut store = MemStore::new();
        let mut q = queue_with_task(&mut store, 100);
        let mut agents: BTreeMap<AgentId, Agent> = BTreeMap::new();
        agents.insert(1, Agent::new(1));
        agents.insert(2, Agent::new(2));
        let mut reg = AgentRegistry::new();
        reg.bind(1, 100, false, &mut q);
        reg.track(2);
        let free = reg.live_agents(&mut agents, &mut q, |_, task, _| match task {
            None => Verdict::Free,
            Some(_) => Verdict::Skip,
        });
        assert_eq!(free, vec![2]);
        assert_eq!(q.get(100).map(|t| t.bound), Some(1));
    }

    #[test]
    fn release_bound_to_frees_only_matching_agents() {
        let mut store = MemStore::new();
        let mut q = queue_with_task(&mut store, 100);
        q.insert(
            TaskSpec::new(TaskKind::Harvest { node: 1 }, 1).into_task(101),
            &mut store,
        );
        let mut reg = AgentRegistry::new();
        reg.bind(1, 100, false, &mut q);
        reg.bind(2, 101, false, &mut q);
        let released = reg.release_bound_to(&[100]);
        assert_eq!(released, vec![1]);
        assert_eq!(reg.bound_task(1), None);
        assert_eq!(reg.bound_task(2), Some(101));
    }
}
