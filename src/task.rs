use serde::{Deserialize, Serialize};

use crate::agent::{AffinityTag, AgentCaps};
use crate::colony::{Colony, Resource, SiteId};
use crate::error::{Result, SchedulerError};

/// Unique, monotonically increasing task identifier. Keys are derived from
/// the domain clock: `tick * KEY_STRIDE + insertion offset`, so same-tick
/// insertions stay uniquely ordered.
pub type TaskKey = u64;

pub type Priority = i32;

pub const KEY_STRIDE: u64 = 1_000;

/// The two-step execution protocol every bound worker runs once per tick.
/// `Applying` is the default: a fresh worker acts as if mid-apply, the
/// common case being that it spawns already carrying what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Phase {
    Acquiring,
    #[default]
    Applying,
}

/// Closed set of task types. Adding a variant without handler arms fails to
/// compile instead of silently discarding tasks at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Move `amount` of `resource` from the stockpile into a site store.
    /// The remaining amount is the task's mutable payload.
    Haul {
        resource: Resource,
        amount: u32,
        dest: SiteId,
    },
    /// Spend stone to add progress to a construction site; removes itself
    /// when the site finishes.
    Build { site: SiteId },
    /// Standing resource-generation task: mine a deposit node into the
    /// carry, dump into the stockpile. Doubles as the dispatch fallback,
    /// so its acquire step never reports an insufficiency of its own.
    Harvest { node: SiteId },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Haul { .. } => "haul",
            TaskKind::Build { .. } => "build",
            TaskKind::Harvest { .. } => "harvest",
        }
    }

    pub fn required_caps(&self) -> AgentCaps {
        match self {
            TaskKind::Haul { .. } => AgentCaps::HAULER,
            TaskKind::Build { .. } => AgentCaps::ALL,
            TaskKind::Harvest { .. } => AgentCaps::ALL,
        }
    }

    /// Checks the prerequisite world objects exist before the task enters
    /// the queue.
    pub fn validate(&self, colony: &Colony) -> Result<()> {
        match self {
            TaskKind::Haul { amount, dest, .. } => {
                if *amount == 0 {
                    return Err(SchedulerError::InvalidTarget("haul amount is zero".into()));
                }
                if colony.site(*dest).is_none() {
                    return Err(SchedulerError::InvalidTarget(format!("unknown site {dest}")));
                }
            }
            TaskKind::Build { site } => match colony.site(*site) {
                None => {
                    return Err(SchedulerError::InvalidTarget(format!("unknown site {site}")));
                }
                Some(s) if s.finished() => {
                    return Err(SchedulerError::InvalidTarget(format!(
                        "site {site} already finished"
                    )));
                }
                Some(_) => {}
            },
            TaskKind::Harvest { node } => {
                if !colony.deposits.contains_key(node) {
                    return Err(SchedulerError::InvalidTarget(format!("unknown deposit {node}")));
                }
            }
        }
        Ok(())
    }
}

fn default_capacity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub key: TaskKey,
    pub kind: TaskKind,
    pub priority: Priority,
    /// Desired number of bound workers.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Live workers currently bound to this task.
    #[serde(default)]
    pub bound: u32,
    #[serde(default)]
    pub affinity: Option<AffinityTag>,
    /// Sub-counter of bound workers carrying the matching affinity tag.
    #[serde(default)]
    pub affinity_bound: u32,
}

impl Task {
    pub fn has_spare_capacity(&self) -> bool {
        self.bound < self.capacity
    }

    pub fn description(&self) -> String {
        match &self.kind {
            TaskKind::Haul {
                resource,
                amount,
                dest,
            } => format!("Haul {amount} {resource:?} to site {dest}"),
            TaskKind::Build { site } => format!("Build site {site}"),
            TaskKind::Harvest { node } => format!("Harvest deposit {node}"),
        }
    }
}

/// Caller-facing description of a task to enqueue. The key and the bound
/// counters are engine-owned and assigned on insert.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub priority: Priority,
    pub capacity: u32,
    pub affinity: Option<AffinityTag>,
}

impl TaskSpec {
    pub fn new(kind: TaskKind, priority: Priority) -> Self {
        Self {
            kind,
            priority,
            capacity: 1,
            affinity: None,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn affinity(mut self, tag: AffinityTag) -> Self {
        self.affinity = Some(tag);
        self
    }

    pub(crate) fn into_task(self, key: TaskKey) -> Task {
        Task {
            key,
            kind: self.kind,
            priority: self.priority,
            capacity: self.capacity.max(1),
            bound: 0,
            affinity: self.affinity,
            affinity_bound: 0,
        }
    }
}

/// Removal and lookup selector: by exact key or by kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    Key(TaskKey),
    Kind(String),
}

impl TaskSelector {
    pub fn kind(name: impl Into<String>) -> Self {
        TaskSelector::Kind(name.into())
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskSelector::Key(key) => task.key == *key,
            TaskSelector::Kind(name) => task.kind.name() == name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::Site;

    #[test]
    fn phase_defaults_to_applying() {
        assert_eq!(Phase::default(), Phase::Applying);
    }

    #[test]
    fn task_description() {
        let t = TaskSpec::new(TaskKind::Build { site: 3 }, 5).into_task(1);
        assert!(t.description().contains("Build site 3"));
    }

    #[test]
    fn spec_defaults_capacity_to_one() {
        let t = TaskSpec::new(TaskKind::Harvest { node: 1 }, 0)
            .capacity(0)
            .into_task(7);
        assert_eq!(t.capacity, 1);
        assert_eq!(t.bound, 0);
        assert!(t.has_spare_capacity());
    }

    #[test]
    fn validate_rejects_missing_targets() {
        let mut colony = Colony::new();
        colony.add_site(Site::construction(1, 10));
        assert!(TaskKind::Build { site: 1 }.validate(&colony).is_ok());
        assert_eq!(
            TaskKind::Build { site: 2 }.validate(&colony),
            Err(SchedulerError::InvalidTarget("unknown site 2".into()))
        );
        assert!(matches!(
            TaskKind::Harvest { node: 9 }.validate(&colony),
            Err(SchedulerError::InvalidTarget(_))
        ));
    }

    #[test]
    fn selector_matches_key_and_kind() {
        let t = TaskSpec::new(
            TaskKind::Haul {
                resource: Resource::Stone,
                amount: 10,
                dest: 1,
            },
            2,
        )
        .into_task(42);
        assert!(TaskSelector::Key(42).matches(&t));
        assert!(!TaskSelector::Key(41).matches(&t));
        assert!(TaskSelector::kind("haul").matches(&t));
        assert!(!TaskSelector::kind("build").matches(&t));
    }

    #[test]
    fn task_fields_default_on_deserialize() {
        let blob = r#"{"key":5,"kind":{"kind":"build","site":1},"priority":3}"#;
        let t: Task = serde_json::from_str(blob).unwrap();
        assert_eq!(t.capacity, 1);
        assert_eq!(t.bound, 0);
        assert!(t.affinity.is_none());
        assert_eq!(t.affinity_bound, 0);
    }
}
