//! `text-embedding-3-*`-family embedder addressed by provider + model name.

use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use super::embedder::Embedder;
use super::error::MemoryError;

pub struct OpenAiEmbedder {
    config: OpenAIConfig,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = Self::model_dimensions(&model);
        Self { config: OpenAIConfig::new(), model, dimensions }
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = Self::model_dimensions(&model);
        Self { config, model, dimensions }
    }

    fn model_dimensions(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let inputs: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let input = if inputs.len() == 1 { EmbeddingInput::String(inputs[0].clone()) } else { EmbeddingInput::StringArray(inputs) };
        let request = CreateEmbeddingRequest { input, model: self.model.clone(), ..Default::default() };

        let client = Client::with_config(self.config.clone());
        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| MemoryError::Embedding(format!("OpenAI API error: {e}")))?;
        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_dimensions_cover_known_models() {
        assert_eq!(OpenAiEmbedder::model_dimensions("text-embedding-3-small"), 1536);
        assert_eq!(OpenAiEmbedder::model_dimensions("text-embedding-3-large"), 3072);
        assert_eq!(OpenAiEmbedder::model_dimensions("unknown-model"), 1536);
    }
}
