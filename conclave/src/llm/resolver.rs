use std::sync::Arc;

use crate::domain::Agent;

use super::{GenerateParams, LlmGateway};

/// Resolves the gateway and call parameters an agent should use for its next
/// turn: a default provider/model is configured globally, and an agent may
/// override either. Kept as a seam so the orchestrator and the
/// agent runtime never hard-code a provider lookup themselves — the actual
/// precedence (agent override, then global default) lives wherever this is
/// implemented against real configuration.
pub trait LlmResolver: Send + Sync {
    fn resolve(&self, agent: &Agent) -> (Arc<dyn LlmGateway>, GenerateParams);
}

/// Resolves every agent to the same gateway and parameters, ignoring any
/// per-agent override. Useful for tests and for a single-provider deployment.
pub struct FixedLlmResolver {
    gateway: Arc<dyn LlmGateway>,
    params: GenerateParams,
}

impl FixedLlmResolver {
    pub fn new(gateway: Arc<dyn LlmGateway>, params: GenerateParams) -> Self {
        Self { gateway, params }
    }
}

impl LlmResolver for FixedLlmResolver {
    fn resolve(&self, _agent: &Agent) -> (Arc<dyn LlmGateway>, GenerateParams) {
        (Arc::clone(&self.gateway), self.params.clone())
    }
}
