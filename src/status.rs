use crate::colony::World;
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::task::Phase;

pub fn format_queue(queue: &TaskQueue) -> Vec<String> {
	let mut out = Vec::new();
	out.push(format!("[Tasks: {}]", queue.domain()));
	for t in queue.tasks() {
		let affinity = t
			.affinity
			.as_ref()
			.map(|tag| format!(" [{tag}]"))
			.unwrap_or_default();
		out.push(format!(
			"#{} – {} – p{} – {}/{}{}",
			t.key,
			t.description(),
			t.priority,
			t.bound,
			t.capacity,
			affinity
		));
	}
	out
}

pub fn format_agents(world: &World, registry: &AgentRegistry) -> Vec<String> {
	let mut out = Vec::new();
	out.push("[Agents]".to_string());
	for agent in world.agents.values() {
		let phase = match agent.phase {
			Phase::Acquiring => "Acquiring",
			Phase::Applying => "Applying",
		};
		let task = registry
			.bound_task(agent.id)
			.map(|key| format!("#{key}"))
			.unwrap_or_else(|| "Idle".to_string());
		out.push(format!("Agent #{} – {} – {}", agent.id, phase, task));
	}
	out
}
