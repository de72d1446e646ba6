// Agent configuration for the loop
//
// AgentConfig is a storage-agnostic configuration struct that can be created
// directly for standalone usage, or built from a contracts::Agent entity via
// `AgentConfigBuilder::from_agent`.

use contracts::{Agent, ToolDefinition};
use serde::{Deserialize, Serialize};

use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Maximum number of tool-calling iterations (prevents infinite loops).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_max_iterations() -> usize {
    10
}

impl AgentConfig {
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: model.into(),
            tools: Vec::new(),
            max_iterations: default_max_iterations(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            model: "simulated".to_string(),
            tools: Vec::new(),
            max_iterations: default_max_iterations(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Builder for [`AgentConfig`] with a fluent API. Can be created from scratch
/// with `new()`, or seeded from a [`contracts::Agent`] entity with
/// `from_agent()`, which resolves the agent's declared tool names against a
/// [`ToolRegistry`].
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn new() -> Self {
        Self { config: AgentConfig::default() }
    }

    /// Seed a builder from an `Agent` entity, resolving its declared tool
    /// names against `registry`. Unknown tool names are skipped rather than
    /// failing the build, since a stale agent definition should not block an
    /// otherwise-valid run.
    pub fn from_agent(agent: &Agent, model: impl Into<String>, registry: &ToolRegistry) -> Self {
        let tools = agent
            .tool_names
            .iter()
            .filter_map(|name| registry.definition(name))
            .collect();

        Self {
            config: AgentConfig {
                system_prompt: agent.system_prompt.clone(),
                model: model.into(),
                tools,
                max_iterations: default_max_iterations(),
                temperature: None,
                max_tokens: None,
            },
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_agent_resolves_declared_tools_and_skips_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register_definition(ToolDefinition::new("echo", "echoes input", serde_json::json!({})));

        let agent = Agent::new("a1", "Agent One", "be helpful")
            .with_tools(vec!["echo".to_string(), "nonexistent".to_string()]);

        let config = AgentConfigBuilder::from_agent(&agent, "simulated", &registry).build();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].name, "echo");
    }
}
