// Provider abstraction: a uniform chat/tool-use contract over N model
// back-ends, plus a registry and a router that picks a provider per request.
//
// The only implementation shipped here is SimulatedProvider, a deterministic
// in-memory driver used for tests, examples, and as the zero-config default.
// Real network-backed providers (Anthropic, OpenAI, local) are external,
// contract-only collaborators registered against the same LlmProvider trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentLoopError, Result};
use crate::traits::{
    LlmCallConfig, LlmCompletionMetadata, LlmMessage, LlmMessageRole, LlmProvider,
    LlmResponseStream, LlmStreamEvent,
};

/// Configuration used when constructing a registered provider. Kept generic
/// (name/api_key/base_url) so a concrete embedder-supplied provider can read
/// whichever fields it needs; this crate only inspects `name`.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// A deterministic, network-free provider. Given no tools it echoes the
/// latest user message prefixed with the configured model name; given tools
/// it never calls them (there is nothing useful to call without a real
/// model), so it always terminates the agent loop on its first iteration.
/// This makes it safe to use as the default provider in tests and examples.
pub struct SimulatedProvider {
    model: String,
}

impl SimulatedProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new("simulated")
    }
}

#[async_trait]
impl LlmProvider for SimulatedProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == LlmMessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let text = format!("[{}] {}", config.model, last_user);
        let metadata = LlmCompletionMetadata {
            total_tokens: Some(text.split_whitespace().count() as u32),
            prompt_tokens: Some(messages.len() as u32),
            completion_tokens: Some(text.split_whitespace().count() as u32),
            model: Some(config.model.clone()),
            finish_reason: Some("stop".to_string()),
        };

        let events = vec![
            Ok(LlmStreamEvent::TextDelta(text)),
            Ok(LlmStreamEvent::Done(metadata)),
        ];
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

/// A named collection of providers with one marked as the default.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { providers: HashMap::new(), default: None }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let name = name.into();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default = Some(name.into());
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn default_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        self.default
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .cloned()
            .ok_or_else(|| AgentLoopError::config("no default provider registered"))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("simulated", Arc::new(SimulatedProvider::default()));
        registry
    }
}

/// An ordered routing rule: if `matches` returns true for a request, `provider`
/// is used. The first matching rule wins; if none match, the registry's
/// default provider is used.
pub struct RoutingRule {
    pub name: String,
    pub matches: Box<dyn Fn(&[LlmMessage], &LlmCallConfig) -> bool + Send + Sync>,
    pub provider: String,
}

/// Selects a provider for a request via ordered predicate rules over a
/// [`ProviderRegistry`] (e.g. "no tools and short" -> a cheap model). Falls
/// back to the registry's default when no rule matches.
pub struct ModelRouter {
    registry: ProviderRegistry,
    rules: Vec<RoutingRule>,
}

impl ModelRouter {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry, rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
    }

    pub fn route(&self, messages: &[LlmMessage], config: &LlmCallConfig) -> Result<Arc<dyn LlmProvider>> {
        for rule in &self.rules {
            if (rule.matches)(messages, config) {
                if let Some(provider) = self.registry.get(&rule.provider) {
                    return Ok(provider);
                }
            }
        }
        self.registry.default_provider()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn simulated_provider_echoes_latest_user_message() {
        let provider = SimulatedProvider::new("simulated");
        let messages = vec![LlmMessage {
            role: LlmMessageRole::User,
            content: "hello there".to_string(),
            tool_calls: None,
            tool_call_id: None,
        }];
        let config = LlmCallConfig { model: "simulated".to_string(), temperature: None, max_tokens: None, tools: vec![] };

        let response = provider.chat_completion(messages, &config).await.unwrap();
        assert!(response.text.contains("hello there"));
        assert!(response.tool_calls.is_none());
    }

    #[tokio::test]
    async fn simulated_provider_stream_terminates_with_done() {
        let provider = SimulatedProvider::default();
        let config = LlmCallConfig { model: "simulated".to_string(), temperature: None, max_tokens: None, tools: vec![] };
        let mut stream = provider.chat_completion_stream(vec![], &config).await.unwrap();

        let mut saw_done = false;
        while let Some(event) = stream.next().await {
            if matches!(event.unwrap(), LlmStreamEvent::Done(_)) {
                saw_done = true;
            }
        }
        assert!(saw_done);
    }

    #[test]
    fn registry_defaults_to_first_registered_provider() {
        let registry = ProviderRegistry::default();
        assert!(registry.default_provider().is_ok());
        assert_eq!(registry.names(), vec!["simulated"]);
    }

    #[test]
    fn router_falls_back_to_default_when_no_rule_matches() {
        let router = ModelRouter::new(ProviderRegistry::default());
        let config = LlmCallConfig { model: "simulated".to_string(), temperature: None, max_tokens: None, tools: vec![] };
        assert!(router.route(&[], &config).is_ok());
    }
}
