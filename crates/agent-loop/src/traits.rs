// Core traits for pluggable backends
//
// These traits allow the agent loop to be used with different backends:
// - In-memory implementations for examples and testing
// - Database implementations for production
// - Channel-based implementations for streaming

use async_trait::async_trait;
use contracts::{ToolCall, ToolDefinition, ToolResult};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::LoopEvent;
use crate::message::ConversationMessage;

// ============================================================================
// EventEmitter - For streaming events during execution
// ============================================================================

/// Trait for emitting events during loop execution.
///
/// Implementations can store events in a database, forward them to a
/// streaming transport, collect them in memory for testing, or do nothing.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LoopEvent) -> Result<()>;

    async fn emit_batch(&self, events: Vec<LoopEvent>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

// ============================================================================
// MessageStore - For persisting conversation messages
// ============================================================================

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store(&self, session_id: Uuid, message: ConversationMessage) -> Result<()>;

    async fn store_batch(&self, session_id: Uuid, messages: Vec<ConversationMessage>) -> Result<()> {
        for message in messages {
            self.store(session_id, message).await?;
        }
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Vec<ConversationMessage>>;

    async fn load_page(
        &self,
        session_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>> {
        let all = self.load(session_id).await?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, session_id: Uuid) -> Result<usize> {
        Ok(self.load(session_id).await?.len())
    }
}

// ============================================================================
// LlmProvider - For calling LLM models
// ============================================================================

pub type LlmResponseStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent>> + Send>>;

#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    TextDelta(String),
    ToolCalls(Vec<ToolCall>),
    Done(LlmCompletionMetadata),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct LlmCompletionMetadata {
    pub total_tokens: Option<u32>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

/// Implementations handle provider-specific API calls and response parsing.
/// The only implementation shipped in this crate is [`crate::provider::SimulatedProvider`];
/// network-backed providers are registered against this trait from outside it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// A stable identifier for the model this provider instance serves, used
    /// by the [`crate::provider::ModelRouter`] for routing decisions.
    fn model_name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream>;

    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        use futures::StreamExt;

        let mut stream = self.chat_completion_stream(messages, config).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut metadata = LlmCompletionMetadata::default();

        while let Some(event) = stream.next().await {
            match event? {
                LlmStreamEvent::TextDelta(delta) => text.push_str(&delta),
                LlmStreamEvent::ToolCalls(calls) => tool_calls = calls,
                LlmStreamEvent::Done(meta) => metadata = meta,
                LlmStreamEvent::Error(err) => return Err(crate::error::AgentLoopError::llm(err)),
            }
        }

        Ok(LlmResponse {
            text,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            metadata,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
}

impl From<&AgentConfig> for LlmCallConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tools: config.tools.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub metadata: LlmCompletionMetadata,
}

// ============================================================================
// ToolExecutor - For executing tool calls
// ============================================================================

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_call: &ToolCall, tool_def: &ToolDefinition) -> Result<ToolResult>;

    async fn execute_batch(
        &self,
        tool_calls: &[ToolCall],
        tool_defs: &[ToolDefinition],
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(tool_calls.len());
        let tool_map: HashMap<&str, &ToolDefinition> =
            tool_defs.iter().map(|def| (def.name.as_str(), def)).collect();

        for tool_call in tool_calls {
            let tool_def = tool_map.get(tool_call.name.as_str()).ok_or_else(|| {
                crate::error::AgentLoopError::tool(format!("Tool definition not found: {}", tool_call.name))
            })?;
            results.push(self.execute(tool_call, tool_def).await?);
        }

        Ok(results)
    }

    async fn execute_parallel(
        &self,
        tool_calls: &[ToolCall],
        tool_defs: &[ToolDefinition],
    ) -> Result<Vec<ToolResult>>
    where
        Self: Sized,
    {
        use futures::future::join_all;

        let tool_map: HashMap<&str, &ToolDefinition> =
            tool_defs.iter().map(|def| (def.name.as_str(), def)).collect();

        let futures: Vec<_> = tool_calls
            .iter()
            .map(|tool_call| async {
                let tool_def = tool_map.get(tool_call.name.as_str()).ok_or_else(|| {
                    crate::error::AgentLoopError::tool(format!("Tool definition not found: {}", tool_call.name))
                })?;
                self.execute(tool_call, tool_def).await
            })
            .collect();

        let results = join_all(futures).await;
        results.into_iter().collect()
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

impl From<&ConversationMessage> for LlmMessage {
    fn from(msg: &ConversationMessage) -> Self {
        let role = match msg.role {
            crate::message::MessageRole::System => LlmMessageRole::System,
            crate::message::MessageRole::User => LlmMessageRole::User,
            crate::message::MessageRole::Assistant => LlmMessageRole::Assistant,
            crate::message::MessageRole::ToolCall => LlmMessageRole::Assistant,
            crate::message::MessageRole::ToolResult => LlmMessageRole::Tool,
        };

        LlmMessage {
            role,
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.clone(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}
