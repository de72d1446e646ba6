// Agent Loop Executor
//
// Coordinates: loading messages from MessageStore, calling the model via
// LlmProvider, executing tools via ToolExecutor, and emitting events via
// EventEmitter.

use std::sync::Arc;

use contracts::{ToolCall, ToolResult};
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentLoopError, Result};
use crate::events::LoopEvent;
use crate::message::ConversationMessage;
use crate::traits::{
    EventEmitter, LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, LlmStreamEvent,
    MessageStore, ToolExecutor,
};

/// Result of a complete loop execution.
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub session_id: Uuid,
    pub messages: Vec<ConversationMessage>,
    pub iterations: usize,
    pub final_response: Option<String>,
}

/// Orchestrates the agentic loop with pluggable backends for event emission,
/// message storage, model calls, and tool execution.
pub struct AgentLoop<E, M, L, T>
where
    E: EventEmitter,
    M: MessageStore,
    L: LlmProvider,
    T: ToolExecutor,
{
    config: AgentConfig,
    event_emitter: Arc<E>,
    message_store: Arc<M>,
    llm_provider: Arc<L>,
    tool_executor: Arc<T>,
}

impl<E, M, L, T> AgentLoop<E, M, L, T>
where
    E: EventEmitter,
    M: MessageStore,
    L: LlmProvider,
    T: ToolExecutor,
{
    pub fn new(config: AgentConfig, event_emitter: E, message_store: M, llm_provider: L, tool_executor: T) -> Self {
        Self::with_arcs(
            config,
            Arc::new(event_emitter),
            Arc::new(message_store),
            Arc::new(llm_provider),
            Arc::new(tool_executor),
        )
    }

    pub fn with_arcs(
        config: AgentConfig,
        event_emitter: Arc<E>,
        message_store: Arc<M>,
        llm_provider: Arc<L>,
        tool_executor: Arc<T>,
    ) -> Self {
        Self { config, event_emitter, message_store, llm_provider, tool_executor }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agentic loop for a session until the model stops requesting
    /// tool calls, or the iteration cap is hit.
    pub async fn run(&self, session_id: Uuid) -> Result<LoopResult> {
        info!(session_id = %session_id, "starting agent loop");
        self.event_emitter.emit(LoopEvent::loop_started(session_id.to_string())).await?;

        let mut messages = self.message_store.load(session_id).await?;
        if messages.is_empty() {
            warn!(session_id = %session_id, "no messages to process");
            return Err(AgentLoopError::NoMessages);
        }

        let mut iteration = 0usize;
        let mut final_response = None;

        loop {
            iteration += 1;

            if iteration > self.config.max_iterations {
                warn!(session_id = %session_id, max = self.config.max_iterations, "max iterations reached");
                self.event_emitter
                    .emit(LoopEvent::loop_error(
                        session_id.to_string(),
                        format!("Max iterations ({}) reached", self.config.max_iterations),
                    ))
                    .await?;
                return Err(AgentLoopError::MaxIterationsReached(self.config.max_iterations));
            }

            self.event_emitter.emit(LoopEvent::iteration_started(session_id.to_string(), iteration)).await?;

            let llm_result = self.call_llm(session_id, iteration, &messages).await?;
            let has_tool_calls = llm_result.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty());

            if !llm_result.text.is_empty() || has_tool_calls {
                let assistant_msg = match &llm_result.tool_calls {
                    Some(tool_calls) => ConversationMessage::assistant_with_tools(&llm_result.text, tool_calls.clone()),
                    None => ConversationMessage::assistant(&llm_result.text),
                };
                self.message_store.store(session_id, assistant_msg.clone()).await?;
                messages.push(assistant_msg);
                if !llm_result.text.is_empty() {
                    final_response = Some(llm_result.text.clone());
                }
            }

            self.event_emitter
                .emit(LoopEvent::llm_call_completed(session_id.to_string(), iteration, has_tool_calls))
                .await?;

            if !has_tool_calls {
                self.event_emitter.emit(LoopEvent::iteration_completed(session_id.to_string(), iteration, false)).await?;
                break;
            }

            let tool_calls = llm_result.tool_calls.unwrap();
            let tool_results = self.execute_tools(session_id, &tool_calls).await?;

            for (tool_call, result) in tool_calls.iter().zip(tool_results.iter()) {
                let content = match (&result.result, &result.error) {
                    (_, Some(err)) => format!("error: {}", err),
                    (Some(value), None) => serde_json::to_string(value).unwrap_or_default(),
                    (None, None) => String::new(),
                };
                let result_msg = ConversationMessage::tool_result(&tool_call.id, content);
                self.message_store.store(session_id, result_msg.clone()).await?;
                messages.push(result_msg);
            }

            self.event_emitter.emit(LoopEvent::iteration_completed(session_id.to_string(), iteration, true)).await?;
        }

        self.event_emitter.emit(LoopEvent::loop_completed(session_id.to_string(), iteration)).await?;
        info!(session_id = %session_id, iterations = iteration, "agent loop completed");

        Ok(LoopResult { session_id, messages, iterations: iteration, final_response })
    }

    /// Add a user message and run the loop to completion.
    pub async fn run_turn(&self, session_id: Uuid, user_message: impl Into<String>) -> Result<LoopResult> {
        let user_msg = ConversationMessage::user(user_message);
        self.message_store.store(session_id, user_msg).await?;
        self.run(session_id).await
    }

    async fn call_llm(&self, session_id: Uuid, iteration: usize, messages: &[ConversationMessage]) -> Result<LlmCallResult> {
        self.event_emitter.emit(LoopEvent::llm_call_started(session_id.to_string(), iteration)).await?;

        let mut llm_messages = Vec::new();
        if !self.config.system_prompt.is_empty() {
            llm_messages.push(LlmMessage {
                role: LlmMessageRole::System,
                content: self.config.system_prompt.clone(),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        llm_messages.extend(messages.iter().map(LlmMessage::from));

        let llm_config = LlmCallConfig::from(&self.config);
        let mut stream = self.llm_provider.chat_completion_stream(llm_messages, &llm_config).await?;

        let message_id = Uuid::now_v7().to_string();
        let mut text = String::new();
        let mut tool_calls = None;

        while let Some(event) = stream.next().await {
            match event? {
                LlmStreamEvent::TextDelta(delta) => {
                    if !delta.is_empty() {
                        text.push_str(&delta);
                        self.event_emitter.emit(LoopEvent::text_delta(session_id.to_string(), &message_id, &delta)).await?;
                    }
                }
                LlmStreamEvent::ToolCalls(calls) => tool_calls = Some(calls),
                LlmStreamEvent::Done(_metadata) => break,
                LlmStreamEvent::Error(err) => {
                    error!(session_id = %session_id, error = %err, "model stream error");
                    return Err(AgentLoopError::llm(err));
                }
            }
        }

        Ok(LlmCallResult { text, tool_calls })
    }

    async fn execute_tools(&self, session_id: Uuid, tool_calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for tool_call in tool_calls {
            self.event_emitter
                .emit(LoopEvent::tool_started(session_id.to_string(), &tool_call.id, &tool_call.name))
                .await?;

            let tool_def = self
                .config
                .tools
                .iter()
                .find(|def| def.name == tool_call.name)
                .ok_or_else(|| AgentLoopError::tool(format!("Tool not found: {}", tool_call.name)))?;

            let result = self.tool_executor.execute(tool_call, tool_def).await?;
            let success = result.error.is_none();

            self.event_emitter
                .emit(LoopEvent::tool_completed(session_id.to_string(), &tool_call.id, success))
                .await?;

            results.push(result);
        }

        Ok(results)
    }
}

struct LlmCallResult {
    text: String,
    tool_calls: Option<Vec<ToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InMemoryMessageStore;
    use crate::provider::SimulatedProvider;
    use crate::tools::{EchoTool, ToolRegistry};
    use crate::events::InMemoryEventEmitter;

    #[tokio::test]
    async fn run_turn_terminates_after_one_iteration_with_simulated_provider() {
        let config = AgentConfig::new("be helpful", "simulated");
        let agent_loop = AgentLoop::new(
            config,
            InMemoryEventEmitter::new(),
            InMemoryMessageStore::new(),
            SimulatedProvider::default(),
            ToolRegistry::new(),
        );

        let session_id = Uuid::now_v7();
        let result = agent_loop.run_turn(session_id, "what is the weather?").await.unwrap();

        assert_eq!(result.iterations, 1);
        assert!(result.final_response.unwrap().contains("what is the weather?"));
    }

    #[tokio::test]
    async fn run_without_messages_fails_with_no_messages() {
        let config = AgentConfig::new("be helpful", "simulated");
        let agent_loop = AgentLoop::new(
            config,
            InMemoryEventEmitter::new(),
            InMemoryMessageStore::new(),
            SimulatedProvider::default(),
            ToolRegistry::new(),
        );

        let err = agent_loop.run(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AgentLoopError::NoMessages));
    }

    #[tokio::test]
    async fn max_iterations_cap_is_enforced() {
        let mut config = AgentConfig::new("be helpful", "simulated");
        config.max_iterations = 0;
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let agent_loop = AgentLoop::new(
            config,
            InMemoryEventEmitter::new(),
            InMemoryMessageStore::new(),
            SimulatedProvider::default(),
            registry,
        );

        let err = agent_loop.run_turn(Uuid::now_v7(), "hello").await.unwrap_err();
        assert!(matches!(err, AgentLoopError::MaxIterationsReached(0)));
    }
}
