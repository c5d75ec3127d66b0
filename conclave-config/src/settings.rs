//! The typed configuration surface: LLM defaults and per-provider
//! keys, memory toggles, event hub tunables, tool executor limits, and
//! cache namespace TTLs. Loaded from the `[conclave]`-shaped TOML produced
//! by [`crate::xdg_toml`]'s config file plus `.env` overrides applied via
//! [`crate::load_and_apply`].

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

fn default_provider() -> String {
    "openai-class".to_string()
}

fn default_true() -> bool {
    true
}

fn default_memory_window() -> usize {
    20
}

fn default_compression_threshold() -> usize {
    10 * 1024
}

fn default_batch_interval_ms() -> u64 {
    50
}

fn default_batch_max_size() -> usize {
    10
}

fn default_field_mapping_version() -> u32 {
    1
}

fn default_max_request_bytes() -> usize {
    5 * 1024 * 1024
}

/// Per-provider connection details (API key, host override).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self { default_provider: default_provider(), providers: HashMap::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_true")]
    pub enable_memory: bool,
    #[serde(default = "default_memory_window")]
    pub memory_window_size: usize,
    #[serde(default = "default_true")]
    pub enable_auto_summarization: bool,
    #[serde(default)]
    pub enable_entity_extraction: bool,
    #[serde(default = "default_provider")]
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enable_memory: true,
            memory_window_size: default_memory_window(),
            enable_auto_summarization: true,
            enable_entity_extraction: false,
            embedding_provider: default_provider(),
            embedding_model: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventHubSettings {
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,
    #[serde(default = "default_field_mapping_version")]
    pub field_mapping_version: u32,
}

impl Default for EventHubSettings {
    fn default() -> Self {
        Self {
            compression_threshold_bytes: default_compression_threshold(),
            batch_interval_ms: default_batch_interval_ms(),
            batch_max_size: default_batch_max_size(),
            field_mapping_version: default_field_mapping_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolExecutorSettings {
    pub workspace_root: PathBuf,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Tool allow-list keyed by agent handle; absence means "all built-in tools".
    #[serde(default)]
    pub allow_list: HashMap<String, Vec<String>>,
}

impl Default for ToolExecutorSettings {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            max_request_bytes: default_max_request_bytes(),
            allow_list: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheSettings {
    /// Per-namespace TTL in seconds; a namespace absent here uses the cache's
    /// own built-in default.
    #[serde(default)]
    pub namespace_ttl_secs: HashMap<String, u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub event_hub: EventHubSettings,
    #[serde(default)]
    pub tools: ToolExecutorSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Settings {
    /// Parse settings from a `[conclave]`-rooted TOML document (the same
    /// file `load_and_apply` reads `[env]` out of).
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize)]
        struct Root {
            #[serde(default)]
            conclave: Settings,
        }
        let root: Root = toml::from_str(content)?;
        Ok(root.conclave)
    }

    /// Load settings from `path`, or return built-in defaults if the file
    /// doesn't exist.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, crate::LoadError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(crate::LoadError::XdgRead)?;
        Self::from_toml_str(&content).map_err(crate::LoadError::XdgParse)
    }
}
