use tracing::warn;

use crate::agent::Agent;
use crate::colony::{Colony, Deposit, Resource};
use crate::task::{Task, TaskKind};

/// Units mined from a deposit per acquire step.
pub const HARVEST_PER_TICK: u32 = 10;
/// Progress a worker can add to a site per apply step.
pub const BUILD_PER_TICK: u32 = 5;

/// Outcome of one acquire step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Acquisition complete, transition to apply.
    Ready,
    /// Not done yet, retry in the same phase next tick.
    Pending,
    /// The source of the named resource is empty; the driver falls back to
    /// resource generation so the worker is never left fully idle.
    Insufficient(Resource),
}

/// Outcome of one apply step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apply {
    /// Made progress, stay in apply.
    Progress,
    /// The carry is spent, transition back to acquire.
    Exhausted,
    /// The task's goal is fully satisfied; the driver removes it.
    Complete,
}

/// One acquire step for the worker's bound task.
pub fn acquire(task: &Task, agent: &mut Agent, colony: &mut Colony) -> Acquire {
    match &task.kind {
        TaskKind::Haul {
            resource, amount, ..
        } => stock_up(agent, colony, *resource, *amount),
        TaskKind::Build { site } => match colony.site(*site) {
            // let apply observe the missing/finished site and complete out
            None => Acquire::Ready,
            Some(s) if s.finished() => Acquire::Ready,
            Some(s) => {
                let needed = s.required - s.progress;
                stock_up(agent, colony, Resource::Stone, needed)
            }
        },
        TaskKind::Harvest { node } => {
            let Some(resource) = colony.deposits.get(node).map(|d| d.resource) else {
                // node gone: keep whatever is carried moving, else wait
                return if agent.carry.is_some() {
                    Acquire::Ready
                } else {
                    Acquire::Pending
                };
            };
            dump_mismatched_carry(agent, colony, Some(resource));
            match colony.deposit_mut(*node) {
                Some(deposit) => mine_step(agent, deposit),
                None => Acquire::Pending,
            }
        }
    }
}

/// One apply step for the worker's bound task.
pub fn apply(task: &mut Task, agent: &mut Agent, colony: &mut Colony) -> Apply {
    let key = task.key;
    match &mut task.kind {
        TaskKind::Haul {
            resource,
            amount,
            dest,
        } => {
            let Some(site) = colony.sites.get_mut(dest) else {
                warn!(task = key, site = *dest, "haul destination gone, discarding task");
                return Apply::Complete;
            };
            let held = agent.carried(*resource);
            if held == 0 {
                return Apply::Exhausted;
            }
            let delivered = agent.unload(*resource, held.min(*amount));
            site.store.add(*resource, delivered);
            *amount -= delivered;
            if *amount == 0 {
                Apply::Complete
            } else {
                Apply::Exhausted
            }
        }
        TaskKind::Build { site } => {
            let Some(site) = colony.sites.get_mut(site) else {
                warn!(task = key, "build site gone, discarding task");
                return Apply::Complete;
            };
            if site.finished() {
                return Apply::Complete;
            }
            let held = agent.carried(Resource::Stone);
            if held == 0 {
                return Apply::Exhausted;
            }
            let spend = held.min(BUILD_PER_TICK).min(site.required - site.progress);
            agent.unload(Resource::Stone, spend);
            site.progress += spend;
            if site.finished() {
                Apply::Complete
            } else {
                Apply::Progress
            }
        }
        TaskKind::Harvest { .. } => {
            // dump everything into the stockpile and head back out
            if let Some((resource, held)) = agent.carry {
                agent.unload(resource, held);
                colony.stockpile.add(resource, held);
            }
            Apply::Exhausted
        }
    }
}

/// The fallback step: generate the missing resource directly from a
/// deposit. Never reports `Insufficient`, which is what keeps the
/// fallback recursion one level deep.
pub fn fallback_acquire(agent: &mut Agent, colony: &mut Colony, resource: Resource) -> Acquire {
    dump_mismatched_carry(agent, colony, Some(resource));
    match colony.deposit_of(resource) {
        Some(deposit) => mine_step(agent, deposit),
        None if agent.carried(resource) > 0 => Acquire::Ready,
        None => Acquire::Pending,
    }
}

/// Withdraws up to `wanted` of `resource` from the stockpile into the
/// carry. Ready once something usable is aboard; `Insufficient` only when
/// both the carry and the stockpile are empty of it.
fn stock_up(agent: &mut Agent, colony: &mut Colony, resource: Resource, wanted: u32) -> Acquire {
    dump_mismatched_carry(agent, colony, Some(resource));
    let goal = wanted.min(agent.carry_cap);
    let held = agent.carried(resource);
    if held >= goal && goal > 0 {
        return Acquire::Ready;
    }
    let withdrawn = colony.stockpile.withdraw(resource, goal.saturating_sub(held));
    let loaded = agent.load(resource, withdrawn);
    if loaded < withdrawn {
        colony.stockpile.add(resource, withdrawn - loaded);
    }
    if agent.carried(resource) > 0 {
        Acquire::Ready
    } else {
        Acquire::Insufficient(resource)
    }
}

/// Mines one step from the deposit into the carry. Ready when the carry is
/// full, or when the node ran dry with something already aboard.
fn mine_step(agent: &mut Agent, deposit: &mut Deposit) -> Acquire {
    let take = HARVEST_PER_TICK
        .min(deposit.remaining)
        .min(agent.carry_space());
    let loaded = agent.load(deposit.resource, take);
    deposit.remaining -= loaded;
    if agent.carry_space() == 0 {
        Acquire::Ready
    } else if loaded == 0 && agent.carried(deposit.resource) > 0 {
        Acquire::Ready
    } else {
        Acquire::Pending
    }
}

/// A worker holds one resource kind at a time; anything else aboard goes
/// back to the stockpile before acquiring.
fn dump_mismatched_carry(agent: &mut Agent, colony: &mut Colony, keep: Option<Resource>) {
    if let Some((held, amount)) = agent.carry
        && keep.is_some_and(|r| r != held)
    {
        agent.unload(held, amount);
        colony.stockpile.add(held, amount);
    }
}
