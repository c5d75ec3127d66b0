use async_trait::async_trait;

use super::error::MemoryError;

/// Produces fixed-size float vectors from text via a configurable
/// embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of dimension [`Embedder::dimension`],
    /// one vector per input in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError>;

    fn dimension(&self) -> usize;
}
