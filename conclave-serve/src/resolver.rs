//! Resolves an agent's LLM gateway and call parameters against loaded
//! configuration: a default provider/model is configured globally, and an
//! agent may override either. Implements [`conclave::llm::LlmResolver`]
//! against [`conclave_config::Settings`].

use std::collections::HashMap;
use std::sync::Arc;

use conclave::domain::Agent;
use conclave::llm::{AnthropicClient, GenerateParams, LlmGateway, LlmResolver, MockLlmGateway, OpenAiCompatibleClient, ProviderClass, ToolCallCapability};
use conclave_config::settings::ProviderSettings;
use conclave_config::Settings;

/// Built-in fallback model per provider class, used when neither the agent
/// nor the configuration names one. A real deployment is expected to set
/// `[conclave.llm]` model defaults; these only keep the server usable out
/// of the box.
fn default_model_for(class: ProviderClass) -> &'static str {
    match class {
        ProviderClass::AnthropicClass => "claude-3-5-sonnet-20241022",
        ProviderClass::OpenaiClass => "gpt-4o-mini",
        ProviderClass::LocalOllamaClass => "llama3",
    }
}

fn build_gateway(class: ProviderClass, provider_settings: Option<&ProviderSettings>) -> Arc<dyn LlmGateway> {
    let api_key = provider_settings.and_then(|p| p.api_key.clone());
    match class {
        ProviderClass::AnthropicClass => Arc::new(AnthropicClient::new(api_key.unwrap_or_default())),
        ProviderClass::OpenaiClass => {
            let host = provider_settings.and_then(|p| p.host.clone());
            Arc::new(OpenAiCompatibleClient::new(api_key, host, ToolCallCapability::Native))
        }
        ProviderClass::LocalOllamaClass => {
            let host = provider_settings.and_then(|p| p.host.clone());
            Arc::new(OpenAiCompatibleClient::new(api_key, host, ToolCallCapability::TextOnly))
        }
    }
}

/// Resolves every known provider class to a gateway built once at startup
/// from `[conclave.llm]`, then picks a gateway/model per agent using
/// per-agent `provider`/`model` overrides, falling back to the
/// configuration's `default_provider`.
pub struct ConfiguredLlmResolver {
    gateways: HashMap<ProviderClass, Arc<dyn LlmGateway>>,
    default_provider: ProviderClass,
}

impl ConfiguredLlmResolver {
    pub fn from_settings(settings: &Settings) -> Self {
        let classes = [ProviderClass::AnthropicClass, ProviderClass::OpenaiClass, ProviderClass::LocalOllamaClass];
        let gateways = classes
            .into_iter()
            .map(|class| {
                let provider_settings = settings.llm.providers.get(&class.to_string());
                (class, build_gateway(class, provider_settings))
            })
            .collect();

        let default_provider = settings.llm.default_provider.parse().unwrap_or(ProviderClass::OpenaiClass);
        Self { gateways, default_provider }
    }

    /// A resolver with a canned, non-streaming-capable mock gateway for
    /// every provider class, for tests and local runs with no API keys.
    pub fn mocked(reply: impl Into<String>) -> Self {
        let mock: Arc<dyn LlmGateway> = Arc::new(MockLlmGateway::with_text(ToolCallCapability::Native, reply));
        let mut gateways = HashMap::new();
        gateways.insert(ProviderClass::AnthropicClass, Arc::clone(&mock));
        gateways.insert(ProviderClass::OpenaiClass, Arc::clone(&mock));
        gateways.insert(ProviderClass::LocalOllamaClass, mock);
        Self { gateways, default_provider: ProviderClass::OpenaiClass }
    }
}

impl LlmResolver for ConfiguredLlmResolver {
    fn resolve(&self, agent: &Agent) -> (Arc<dyn LlmGateway>, GenerateParams) {
        let class = agent.config.provider.as_deref().and_then(|p| p.parse().ok()).unwrap_or(self.default_provider);
        let gateway = self.gateways.get(&class).cloned().unwrap_or_else(|| self.gateways[&self.default_provider].clone());
        let model = agent.config.model.clone().unwrap_or_else(|| default_model_for(class).to_string());
        let params = GenerateParams { provider: class.to_string(), model, temperature: agent.config.temperature, max_tokens: agent.config.max_tokens };
        (gateway, params)
    }
}
