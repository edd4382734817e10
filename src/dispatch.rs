use tracing::debug;

use crate::agent::{AffinityTag, AgentId};
use crate::queue::TaskQueue;
use crate::registry::{AgentLookup, AgentRegistry, Verdict};
use crate::store::TaskStore;
use crate::task::{Task, TaskKey};

/// Redistributes every free worker across the queue.
///
/// A worker is free when its binding is empty or names a task no longer in
/// the queue; the query clears such bindings as a side effect. Workers
/// carrying an affinity tag are dispatched before plain workers, so a task
/// requiring a tag gets its specialists ahead of anyone else.
pub fn dispatch_all(
    queue: &mut TaskQueue,
    registry: &mut AgentRegistry,
    lookup: &mut dyn AgentLookup,
    store: &mut dyn TaskStore,
) {
    queue.resort();
    let free = registry.live_agents(lookup, queue, |_, task, queue| match task {
        None => Verdict::Free,
        Some(key) if !queue.has_key(key) => Verdict::Free,
        Some(_) => Verdict::Skip,
    });
    if free.is_empty() {
        return;
    }
    let (tagged, plain): (Vec<AgentId>, Vec<AgentId>) = free
        .into_iter()
        .partition(|id| lookup.resolve(*id).is_some_and(|a| a.tag.is_some()));
    for id in tagged.into_iter().chain(plain) {
        dispatch_one(queue, registry, lookup, id);
    }
    queue.persist(store);
}

/// Assigns one free worker, scanning tasks in priority order.
///
/// First pass: spare capacity plus the affinity rule (the task's tag must
/// equal the worker's — a tagged worker never fills an untagged task, and
/// an untagged worker never fills a tagged one). If every compatible task
/// is fully staffed, a second overflow pass ignores capacity but still
/// honors affinity, so reinforcement lands on the highest-priority
/// compatible task rather than leaving the worker idle. An empty queue, or
/// no compatible task at all, leaves the worker unbound.
pub fn dispatch_one(
    queue: &mut TaskQueue,
    registry: &mut AgentRegistry,
    lookup: &mut dyn AgentLookup,
    id: AgentId,
) -> Option<TaskKey> {
    let tag = lookup.resolve(id)?.tag.clone();
    let key = queue
        .tasks()
        .iter()
        .find(|t| t.has_spare_capacity() && affinity_ok(t, tag.as_ref()))
        .or_else(|| queue.tasks().iter().find(|t| affinity_ok(t, tag.as_ref())))
        .map(|t| t.key)?;
    registry.bind(id, key, tag.is_some(), queue);
    debug!(agent = id, task = key, "dispatched");
    Some(key)
}

fn affinity_ok(task: &Task, tag: Option<&AffinityTag>) -> bool {
    task.affinity.as_ref() == tag
}
