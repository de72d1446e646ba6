// Agent Loop Abstraction
//
// This crate provides a storage-agnostic, streamable implementation of an
// agentic loop (LLM call -> tool execution -> repeat).
//
// Key design decisions:
// - Uses traits (EventEmitter, MessageStore, ToolExecutor, LlmProvider) for
//   pluggable backends, so the loop itself never touches a database or a
//   concrete model vendor.
// - Configuration via AgentConfig, built directly or from a contracts::Agent.
// - Tools are defined via a Tool trait; ToolRegistry implements ToolExecutor.
// - Error handling distinguishes between user-visible tool errors and
//   internal errors that must never reach the model verbatim.
// - The only shipped LlmProvider is SimulatedProvider, a deterministic
//   in-memory driver; real network-backed providers register against the
//   same trait from outside this crate.

pub mod agent_registry;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tools;
pub mod traits;

pub use agent_registry::AgentRegistry;
pub use config::{AgentConfig, AgentConfigBuilder};
pub use error::{AgentLoopError, Result};
pub use events::{InMemoryEventEmitter, LoopEvent};
pub use executor::{AgentLoop, LoopResult};
pub use memory::{InMemoryMemoryStore, MemoryStore};
pub use message::{ConversationMessage, InMemoryMessageStore, MessageRole};
pub use provider::{ModelRouter, ProviderConfig, ProviderRegistry, SimulatedProvider};
pub use tools::{
    CurrentTimeTool, EchoTool, HttpGetTool, Tool, ToolExecutionResult, ToolInternalError, ToolRegistry,
};
pub use traits::{EventEmitter, LlmProvider, MessageStore, ToolExecutor};
