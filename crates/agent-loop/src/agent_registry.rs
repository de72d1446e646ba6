// A registry of named agents the planner assigns plan steps to and the
// orchestrator resolves at execution time.

use contracts::Agent;
use std::collections::HashMap;

/// Holds the agents available to the planner/orchestrator. Seeded at startup
/// with a small built-in set; an embedder may register more.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { agents: HashMap::new() }
    }

    /// A registry seeded with the built-in illustrative agents.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            Agent::new(
                "default_research_agent",
                "Research Agent",
                "You are a research agent. Gather information relevant to the task and \
                 summarize your findings clearly and concisely.",
            )
            .with_description("Gathers and synthesizes information.")
            .with_tools(vec!["http_get".to_string(), "current_time".to_string()]),
        );
        registry.register(
            Agent::new(
                "default_coding_agent",
                "Coding Agent",
                "You are a coding agent. Write correct, idiomatic code for the requested task \
                 and explain any non-obvious decisions.",
            )
            .with_description("Writes and explains code."),
        );
        registry.register(
            Agent::new(
                "default_writer_agent",
                "Writer Agent",
                "You are a writing agent. Produce clear, well-structured prose for the \
                 requested task.",
            )
            .with_description("Drafts and edits written content."),
        );
        registry
    }

    pub fn register(&mut self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn list(&self) -> Vec<&Agent> {
        self.agents.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_and_active() {
        let registry = AgentRegistry::with_builtins();
        assert!(registry.contains("default_research_agent"));
        assert!(registry.contains("default_coding_agent"));
        assert!(registry.contains("default_writer_agent"));
        assert_eq!(registry.list().len(), 3);
    }

    #[test]
    fn unknown_agent_id_returns_none() {
        let registry = AgentRegistry::with_builtins();
        assert!(registry.get("does_not_exist").is_none());
    }
}
