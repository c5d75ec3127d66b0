use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventHubError {
    #[error("session not found: {0}")]
    SessionNotFound(crate::domain::Id),
    #[error("codec: {0}")]
    Codec(#[from] conclave_protocol::CodecError),
}
