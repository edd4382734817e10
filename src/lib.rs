pub mod agent;
pub mod colony;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod status;
pub mod store;
pub mod task;

// Re-exports for convenience in tests and integration users.
pub use agent::{AffinityTag, Agent, AgentCaps, AgentId};
pub use colony::{Colony, Deposit, Resource, Site, SiteId, Stockpile, World};
pub use engine::{AddOpts, Clock, Scheduler, SchedulerContext};
pub use error::SchedulerError;
pub use handler::{Acquire, Apply};
pub use queue::TaskQueue;
pub use registry::{AgentLookup, AgentRegistry, Verdict};
pub use status::{format_agents, format_queue};
pub use store::{MemStore, TaskStore};
pub use task::{Phase, Priority, Task, TaskKey, TaskKind, TaskSelector, TaskSpec};
