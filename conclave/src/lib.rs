//! Multi-agent chat backend runtime: typed domain entities, storage, cache,
//! the LLM gateway, sandboxed tool execution, long-term memory, the
//! multi-session event hub, the per-turn agent runtime, and the workflow
//! orchestrator.

pub mod agent_runtime;
pub mod cache;
pub mod domain;
pub mod error;
pub mod events;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod store;
pub mod tools;

pub use error::ConclaveError;
