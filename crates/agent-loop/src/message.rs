// Message types
//
// ConversationMessage is a storage-agnostic message type representing a
// single turn in an agent's conversation history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::ToolCall;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::traits::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    ToolCall,
    ToolResult,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::ToolCall => write!(f, "tool_call"),
            MessageRole::ToolResult => write!(f, "tool_result"),
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "system" => MessageRole::System,
            "assistant" => MessageRole::Assistant,
            "tool_call" => MessageRole::ToolCall,
            "tool_result" => MessageRole::ToolResult,
            _ => MessageRole::User,
        }
    }
}

/// A single turn in a conversation, flattened to a plain-text `content` for
/// LLM consumption. Tool-call/tool-result structure is carried alongside it
/// rather than nested inside an enum, since every provider eventually wants
/// it as a string anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), None, None)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), None, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), None, None)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), None, Some(tool_calls))
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::ToolResult, content.into(), Some(tool_call_id.into()), None)
    }

    fn new(
        role: MessageRole,
        content: String,
        tool_call_id: Option<String>,
        tool_calls: Option<Vec<ToolCall>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            tool_call_id,
            tool_calls,
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

/// An in-memory [`MessageStore`], used by tests and as the default when no
/// durable store is configured.
#[derive(Default)]
pub struct InMemoryMessageStore {
    sessions: Mutex<HashMap<Uuid, Vec<ConversationMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn store(&self, session_id: Uuid, message: ConversationMessage) -> Result<()> {
        self.sessions.lock().unwrap().entry(session_id).or_default().push(message);
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Vec<ConversationMessage>> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_round_trips_content() {
        let msg = ConversationMessage::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
    }

    #[tokio::test]
    async fn in_memory_store_loads_in_insertion_order() {
        let store = InMemoryMessageStore::new();
        let session = Uuid::now_v7();
        store.store(session, ConversationMessage::user("one")).await.unwrap();
        store.store(session, ConversationMessage::assistant("two")).await.unwrap();

        let loaded = store.load(session).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "one");
        assert_eq!(loaded[1].content, "two");
    }
}
