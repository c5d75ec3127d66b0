//! Each subsystem also defines its own narrower error enum (`CacheError`,
//! `StoreError`, `ToolSourceError`, ...); this one is the shape the
//! WebSocket frontend ultimately reports to a client as `{error: class}`.

use thiserror::Error;

use crate::domain::Id;

#[derive(Error, Debug)]
pub enum ConclaveError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("unknown dependency: task {0}")]
    UnknownDependency(String),
    #[error("cyclic plan")]
    CyclicPlan,
    #[error("empty plan")]
    EmptyPlan,
    #[error("duplicate task: {0}")]
    DuplicateTask(String),
    #[error("path outside workspace: {0}")]
    PathOutsideWorkspace(String),
    #[error("tool I/O failure: {0}")]
    ToolIoFailure(String),
    #[error("LLM provider error: {0}")]
    LlmProviderError(String),
    #[error("LLM rate limited")]
    LlmRateLimited,
    #[error("LLM timeout")]
    LlmTimeout,
    #[error("LLM stream error: {0}")]
    LlmStreamError(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<crate::llm::LlmError> for ConclaveError {
    fn from(err: crate::llm::LlmError) -> Self {
        use crate::llm::LlmError;
        match err {
            LlmError::ProviderError(msg) => ConclaveError::LlmProviderError(msg),
            LlmError::RateLimited => ConclaveError::LlmRateLimited,
            LlmError::Timeout => ConclaveError::LlmTimeout,
            LlmError::StreamError(msg) => ConclaveError::LlmStreamError(msg),
        }
    }
}

impl From<crate::tools::ToolError> for ConclaveError {
    fn from(err: crate::tools::ToolError) -> Self {
        use crate::tools::ToolError;
        match err {
            ToolError::PathOutsideWorkspace(p) => ConclaveError::PathOutsideWorkspace(p),
            other => ConclaveError::ToolIoFailure(other.to_string()),
        }
    }
}

impl From<crate::store::StoreError> for ConclaveError {
    fn from(err: crate::store::StoreError) -> Self {
        ConclaveError::InvalidState(err.to_string())
    }
}

impl From<crate::memory::MemoryError> for ConclaveError {
    fn from(err: crate::memory::MemoryError) -> Self {
        ConclaveError::InvalidState(err.to_string())
    }
}

impl From<crate::events::EventHubError> for ConclaveError {
    fn from(err: crate::events::EventHubError) -> Self {
        ConclaveError::InvalidState(err.to_string())
    }
}

impl ConclaveError {
    /// Machine-readable class name for the `{error: class}` metadata field
    /// and for the wire `error_*` event family.
    pub fn class(&self) -> &'static str {
        match self {
            ConclaveError::Validation(_) => "ValidationError",
            ConclaveError::NotFound(_) => "NotFound",
            ConclaveError::Conflict(_) => "Conflict",
            ConclaveError::InvalidState(_) => "InvalidState",
            ConclaveError::UnknownAgent(_) => "UnknownAgent",
            ConclaveError::UnknownDependency(_) => "UnknownDependency",
            ConclaveError::CyclicPlan => "CyclicPlan",
            ConclaveError::EmptyPlan => "EmptyPlan",
            ConclaveError::DuplicateTask(_) => "DuplicateTask",
            ConclaveError::PathOutsideWorkspace(_) => "PathOutsideWorkspace",
            ConclaveError::ToolIoFailure(_) => "ToolIOFailure",
            ConclaveError::LlmProviderError(_) => "LLMProviderError",
            ConclaveError::LlmRateLimited => "LLMRateLimited",
            ConclaveError::LlmTimeout => "LLMTimeout",
            ConclaveError::LlmStreamError(_) => "LLMStreamError",
            ConclaveError::Cancelled => "Cancelled",
        }
    }

    pub fn not_found_agent(id: Id) -> Self {
        ConclaveError::NotFound(format!("agent {id}"))
    }

    pub fn not_found_channel(id: Id) -> Self {
        ConclaveError::NotFound(format!("channel {id}"))
    }

    pub fn not_found_workflow(id: Id) -> Self {
        ConclaveError::NotFound(format!("workflow {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_match_spec_error_classes() {
        assert_eq!(ConclaveError::CyclicPlan.class(), "CyclicPlan");
        assert_eq!(ConclaveError::Cancelled.class(), "Cancelled");
        assert_eq!(ConclaveError::UnknownAgent("@ghost".into()).class(), "UnknownAgent");
    }
}
