use tracing::{debug, warn};

use crate::agent::AgentId;
use crate::colony::World;
use crate::dispatch;
use crate::error::{Result, SchedulerError};
use crate::handler::{self, Acquire, Apply};
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::store::TaskStore;
use crate::task::{KEY_STRIDE, Phase, Task, TaskKey, TaskSelector, TaskSpec};

/// Monotonic tick counter, used for task key generation and rate-limited
/// logging. Never for timeouts.
#[derive(Debug, Default)]
pub struct Clock {
    tick: u64,
    seq: u32,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.seq = 0;
    }

    /// Time-based key with a per-tick insertion offset as tie-break. A tick
    /// with more insertions than the stride borrows from the next tick's
    /// range so keys stay unique and monotonic.
    pub fn next_key(&mut self) -> TaskKey {
        let key = self.tick * KEY_STRIDE + u64::from(self.seq);
        self.seq += 1;
        if u64::from(self.seq) >= KEY_STRIDE {
            self.tick += 1;
            self.seq = 0;
        }
        key
    }

    pub fn every(&self, interval: u64) -> bool {
        interval > 0 && self.tick % interval == 0
    }
}

/// Per-domain scheduler state: domain key, clock, and the persistence
/// store. One independent instance per colony, passed explicitly; there
/// are no module-level registries.
pub struct SchedulerContext {
    pub domain: String,
    pub clock: Clock,
    pub store: Box<dyn TaskStore>,
}

impl SchedulerContext {
    pub fn new(domain: impl Into<String>, store: Box<dyn TaskStore>) -> Self {
        Self {
            domain: domain.into(),
            clock: Clock::new(),
            store,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AddOpts {
    /// Run a dispatch pass right after the insert.
    pub dispatch: bool,
    /// Reject the insert with `NameExists` if a task of the same kind is
    /// already queued.
    pub unique: bool,
}

impl Default for AddOpts {
    fn default() -> Self {
        Self {
            dispatch: true,
            unique: false,
        }
    }
}

/// The task queue, agent registry, and dispatch loop for one scheduling
/// domain. Strictly single-threaded and tick-driven: callers invoke
/// [`Scheduler::tick`] once per simulation step.
pub struct Scheduler {
    pub ctx: SchedulerContext,
    pub queue: TaskQueue,
    pub registry: AgentRegistry,
}

impl Scheduler {
    /// Rehydrates the domain's queue from the context's store.
    pub fn new(ctx: SchedulerContext) -> Self {
        let queue = TaskQueue::load(ctx.domain.clone(), ctx.store.as_ref());
        Self {
            ctx,
            queue,
            registry: AgentRegistry::new(),
        }
    }

    /// Validates and enqueues a task, returning its assigned key.
    pub fn add_task(
        &mut self,
        world: &mut World,
        spec: TaskSpec,
        opts: AddOpts,
    ) -> Result<TaskKey> {
        if opts.unique && self.queue.has_kind(spec.kind.name()) {
            return Err(SchedulerError::NameExists(spec.kind.name().to_string()));
        }
        spec.kind.validate(&world.colony)?;
        let key = self.ctx.clock.next_key();
        let task = spec.into_task(key);
        debug!(
            task = key,
            kind = task.kind.name(),
            priority = task.priority,
            "task added"
        );
        self.queue.insert(task, self.ctx.store.as_mut());
        if opts.dispatch {
            self.dispatch_all(world);
        }
        Ok(key)
    }

    pub fn task(&self, key: TaskKey) -> Result<&Task> {
        self.queue.get(key).ok_or(SchedulerError::NotFound(key))
    }

    /// Removes every task matching the selector, frees the workers that
    /// were bound to them, and re-dispatches within the same call. Removing
    /// nothing is a success, so callers never special-case a lost race.
    pub fn remove_task(
        &mut self,
        world: &mut World,
        selector: &TaskSelector,
    ) -> Result<Vec<TaskKey>> {
        let removed = self.queue.remove(selector, self.ctx.store.as_mut());
        if !removed.is_empty() {
            let released = self.registry.release_bound_to(&removed);
            debug!(
                removed = removed.len(),
                released = released.len(),
                "tasks removed"
            );
            self.dispatch_all(world);
        }
        Ok(removed)
    }

    /// One dispatch pass: track every live worker, free the unbound or
    /// stale ones, and assign them across the queue.
    pub fn dispatch_all(&mut self, world: &mut World) {
        for id in world.agent_ids() {
            self.registry.track(id);
        }
        dispatch::dispatch_all(
            &mut self.queue,
            &mut self.registry,
            world,
            self.ctx.store.as_mut(),
        );
    }

    /// One full scheduling step: advance the clock, redistribute freed
    /// workers, then drive every bound worker through its current phase.
    pub fn tick(&mut self, world: &mut World) {
        self.ctx.clock.advance();
        self.dispatch_all(world);
        for id in world.agent_ids() {
            self.step_agent(world, id);
        }
        if self.ctx.clock.every(100) {
            debug!(
                domain = %self.ctx.domain,
                tick = self.ctx.clock.tick(),
                queued = self.queue.len(),
                "scheduler heartbeat"
            );
        }
    }

    /// Runs one acquire/apply step for a bound worker. A missing or stale
    /// binding is a no-op; it self-heals on the next dispatch pass.
    pub fn step_agent(&mut self, world: &mut World, id: AgentId) {
        let Some(key) = self.registry.bound_task(id) else {
            return;
        };
        let (required, kind) = match self.queue.get(key) {
            Some(task) => (task.kind.required_caps(), task.kind.name()),
            None => return,
        };
        let (caps, phase) = match world.agent(id) {
            Some(agent) => (agent.caps, agent.phase),
            None => return,
        };
        if !caps.covers(required) {
            // an unworkable task must never stall the loop: discard it and
            // let the worker re-enter normal dispatch
            warn!(
                agent = id,
                task = key,
                kind,
                "agent lacks required capabilities, discarding task"
            );
            if let Some(agent) = world.agent_mut(id) {
                agent.phase = Phase::Applying;
            }
            self.discard(world, key);
            return;
        }
        match phase {
            Phase::Applying => {
                let outcome = {
                    let World { agents, colony } = &mut *world;
                    let Some(agent) = agents.get_mut(&id) else {
                        return;
                    };
                    let Some(task) = self.queue.get_mut(key) else {
                        return;
                    };
                    handler::apply(task, agent, colony)
                };
                // apply may have mutated the task payload
                self.queue.persist(self.ctx.store.as_mut());
                match outcome {
                    Apply::Progress => {}
                    Apply::Exhausted => {
                        if let Some(agent) = world.agent_mut(id) {
                            agent.phase = Phase::Acquiring;
                        }
                    }
                    Apply::Complete => self.discard(world, key),
                }
            }
            Phase::Acquiring => {
                let outcome = {
                    let World { agents, colony } = &mut *world;
                    let Some(agent) = agents.get_mut(&id) else {
                        return;
                    };
                    let Some(task) = self.queue.get(key) else {
                        return;
                    };
                    handler::acquire(task, agent, colony)
                };
                match outcome {
                    Acquire::Ready => {
                        if let Some(agent) = world.agent_mut(id) {
                            agent.phase = Phase::Applying;
                        }
                    }
                    Acquire::Pending => {}
                    Acquire::Insufficient(resource) => {
                        // fall back to resource generation so the worker is
                        // never left fully idle; the fallback's own acquire
                        // cannot report the same insufficiency
                        let World { agents, colony } = &mut *world;
                        if let Some(agent) = agents.get_mut(&id)
                            && handler::fallback_acquire(agent, colony, resource) == Acquire::Ready
                        {
                            agent.phase = Phase::Applying;
                        }
                    }
                }
            }
        }
    }

    fn discard(&mut self, world: &mut World, key: TaskKey) {
        let removed = self
            .queue
            .remove(&TaskSelector::Key(key), self.ctx.store.as_mut());
        if !removed.is_empty() {
            self.registry.release_bound_to(&removed);
            self.dispatch_all(world);
        }
    }
}
