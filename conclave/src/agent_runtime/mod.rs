//! Drives one agent through one conversational turn: prompt assembly, the
//! streaming provider call, tool-call handling, and persistence.

mod context;
mod dispatch;
mod prompt;
mod runtime;

pub use context::{RunContext, DEFAULT_WINDOW};
pub use prompt::{assemble_system_prompt, tool_specs_for_allow_list, MAX_MEMORY_RECORDS};
pub use runtime::AgentRuntime;
