use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("embedding: {0}")]
    Embedding(String),
    #[error("summarization: {0}")]
    Summarization(String),
    #[error("storage: {0}")]
    Storage(String),
}
