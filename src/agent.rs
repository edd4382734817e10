use serde::{Deserialize, Serialize};

use crate::colony::Resource;
use crate::task::Phase;

pub type AgentId = u32;

/// Tag a worker can carry to count toward a task's specialized sub-capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffinityTag(String);

impl AffinityTag {
	pub fn new(tag: impl Into<String>) -> Self {
		Self(tag.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for AffinityTag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCaps {
	pub carry: bool,
	pub work: bool,
}

impl AgentCaps {
	pub const ALL: AgentCaps = AgentCaps { carry: true, work: true };
	pub const HAULER: AgentCaps = AgentCaps { carry: true, work: false };
	pub const WORKER: AgentCaps = AgentCaps { carry: false, work: true };

	pub fn covers(self, required: AgentCaps) -> bool {
		(!required.carry || self.carry) && (!required.work || self.work)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
	pub id: AgentId,
	pub caps: AgentCaps,
	pub tag: Option<AffinityTag>,
	pub phase: Phase,
	pub carry: Option<(Resource, u32)>,
	pub carry_cap: u32,
}

impl Agent {
	pub fn new(id: AgentId) -> Self {
		Self {
			id,
			caps: AgentCaps::ALL,
			tag: None,
			phase: Phase::default(),
			carry: None,
			carry_cap: 50,
		}
	}

	pub fn with_caps(mut self, caps: AgentCaps) -> Self {
		self.caps = caps;
		self
	}

	pub fn with_tag(mut self, tag: AffinityTag) -> Self {
		self.tag = Some(tag);
		self
	}

	pub fn carried(&self, resource: Resource) -> u32 {
		match self.carry {
			Some((r, n)) if r == resource => n,
			_ => 0,
		}
	}

	pub fn carry_space(&self) -> u32 {
		let used = self.carry.map(|(_, n)| n).unwrap_or(0);
		self.carry_cap.saturating_sub(used)
	}

	/// Loads up to `amount` of `resource`, returning how much actually fit.
	/// A worker holds one resource kind at a time; a mismatched load is refused.
	pub fn load(&mut self, resource: Resource, amount: u32) -> u32 {
		match self.carry {
			Some((r, _)) if r != resource => 0,
			_ => {
				let taken = amount.min(self.carry_space());
				if taken > 0 {
					let held = self.carried(resource);
					self.carry = Some((resource, held.saturating_add(taken)));
				}
				taken
			}
		}
	}

	/// Unloads up to `amount` of `resource`, returning how much came out.
	pub fn unload(&mut self, resource: Resource, amount: u32) -> u32 {
		let held = self.carried(resource);
		let taken = amount.min(held);
		if taken == 0 {
			return 0;
		}
		let left = held - taken;
		self.carry = if left == 0 { None } else { Some((resource, left)) };
		taken
	}
}
