use thiserror::Error;

/// Classified tool-call failures.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("path outside workspace: {0}")]
    PathOutsideWorkspace(String),
    #[error("io failure: {0}")]
    IoFailure(String),
    #[error("body too large: {0} bytes exceeds the {1} byte limit")]
    TooLarge(usize, usize),
}
