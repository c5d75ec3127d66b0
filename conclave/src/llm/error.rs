use thiserror::Error;

/// Failure modes a provider call can surface. The gateway performs no
/// retries; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("rate limited")]
    RateLimited,
    #[error("timeout")]
    Timeout,
    #[error("stream error: {0}")]
    StreamError(String),
}
