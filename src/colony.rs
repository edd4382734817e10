use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};

pub type SiteId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Stone,
    Iron,
}

/// Per-resource amounts with saturating arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stockpile {
    pub stone: u32,
    pub iron: u32,
}

impl Stockpile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Stone => self.stone,
            Resource::Iron => self.iron,
        }
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        let slot = match resource {
            Resource::Stone => &mut self.stone,
            Resource::Iron => &mut self.iron,
        };
        *slot = slot.saturating_add(amount);
    }

    /// Takes up to `amount`, returning how much was actually available.
    pub fn withdraw(&mut self, resource: Resource, amount: u32) -> u32 {
        let slot = match resource {
            Resource::Stone => &mut self.stone,
            Resource::Iron => &mut self.iron,
        };
        let taken = amount.min(*slot);
        *slot -= taken;
        taken
    }
}

/// A construction or storage site. `required == 0` means storage only.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: SiteId,
    pub store: Stockpile,
    pub progress: u32,
    pub required: u32,
}

impl Site {
    pub fn storage(id: SiteId) -> Self {
        Self {
            id,
            store: Stockpile::new(),
            progress: 0,
            required: 0,
        }
    }

    pub fn construction(id: SiteId, required: u32) -> Self {
        Self {
            id,
            store: Stockpile::new(),
            progress: 0,
            required,
        }
    }

    pub fn finished(&self) -> bool {
        self.progress >= self.required
    }
}

/// A mineable resource node, the target of harvest work.
#[derive(Debug, Clone)]
pub struct Deposit {
    pub id: SiteId,
    pub resource: Resource,
    pub remaining: u32,
}

#[derive(Debug, Default)]
pub struct Colony {
    pub stockpile: Stockpile,
    pub sites: BTreeMap<SiteId, Site>,
    pub deposits: BTreeMap<SiteId, Deposit>,
}

impl Colony {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&mut self, site: Site) {
        self.sites.insert(site.id, site);
    }

    pub fn add_deposit(&mut self, deposit: Deposit) {
        self.deposits.insert(deposit.id, deposit);
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(&id)
    }

    pub fn site_mut(&mut self, id: SiteId) -> Option<&mut Site> {
        self.sites.get_mut(&id)
    }

    pub fn deposit_mut(&mut self, id: SiteId) -> Option<&mut Deposit> {
        self.deposits.get_mut(&id)
    }

    /// First deposit of the given resource that still has anything left.
    pub fn deposit_of(&mut self, resource: Resource) -> Option<&mut Deposit> {
        self.deposits
            .values_mut()
            .find(|d| d.resource == resource && d.remaining > 0)
    }
}

/// One scheduling domain's world state: the worker roster plus everything
/// the phase handlers act on. Agents are kept in a `BTreeMap` so every
/// pass visits them in deterministic id order.
#[derive(Debug, Default)]
pub struct World {
    pub agents: BTreeMap<AgentId, Agent>,
    pub colony: Colony,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stockpile_withdraw_caps_at_available() {
        let mut s = Stockpile::new();
        s.add(Resource::Stone, 5);
        assert_eq!(s.withdraw(Resource::Stone, 3), 3);
        assert_eq!(s.withdraw(Resource::Stone, 9), 2);
        assert_eq!(s.withdraw(Resource::Stone, 1), 0);
        assert_eq!(s.withdraw(Resource::Iron, 1), 0);
    }

    #[test]
    fn site_finishes_at_required_progress() {
        let mut site = Site::construction(1, 10);
        assert!(!site.finished());
        site.progress = 10;
        assert!(site.finished());
        assert!(Site::storage(2).finished());
    }

    #[test]
    fn deposit_lookup_skips_exhausted_nodes() {
        let mut c = Colony::new();
        c.add_deposit(Deposit {
            id: 1,
            resource: Resource::Iron,
            remaining: 0,
        });
        c.add_deposit(Deposit {
            id: 2,
            resource: Resource::Iron,
            remaining: 40,
        });
        assert_eq!(c.deposit_of(Resource::Iron).map(|d| d.id), Some(2));
        assert!(c.deposit_of(Resource::Stone).is_none());
    }

    #[test]
    fn world_resolves_and_drops_agents() {
        let mut w = World::new();
        w.spawn(Agent::new(7));
        assert!(w.agent(7).is_some());
        assert!(w.agent(8).is_none());
        w.remove_agent(7);
        assert!(w.agent(7).is_none());
    }
}
