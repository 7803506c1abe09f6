//! Gateway configuration records.
//!
//! A [`GatewayConfig`] holds the global settings together with the provider,
//! model and template records the gateway reads. It is stored as TOML:
//!
//! ```toml
//! [settings]
//! default_provider = "local"
//! default_model = "qwen"
//!
//! [[providers]]
//! id = "local"
//! kind = "ollama"
//! base_url = "http://localhost:11434"
//!
//! [[models]]
//! id = "qwen"
//! provider_id = "local"
//! name = "qwen2.5:7b"
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::env::defaults;
use crate::llm::types::{ModelConfig, ProviderConfig};
use crate::prompt::store::PromptTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    /// Request a streamed body from collect-mode models in buffered calls
    pub enable_streaming: bool,
    pub enable_caching: bool,
    pub cache_ttl_secs: u64,
    pub prompt_cache_ttl_secs: u64,
    pub prompt_negative_ttl_secs: u64,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            default_temperature: defaults::TEMPERATURE,
            default_max_tokens: defaults::MAX_TOKENS,
            enable_streaming: true,
            enable_caching: true,
            cache_ttl_secs: defaults::RESPONSE_CACHE_TTL_SECS,
            prompt_cache_ttl_secs: defaults::PROMPT_CACHE_TTL_SECS,
            prompt_negative_ttl_secs: defaults::PROMPT_NEGATIVE_TTL_SECS,
            default_provider: None,
            default_model: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub settings: GatewaySettings,
    pub providers: Vec<ProviderConfig>,
    pub models: Vec<ModelConfig>,
    pub templates: Vec<PromptTemplate>,
}

impl GatewayConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Default provider and model ids, falling back to the first active records
    pub fn default_target(&self) -> Option<(String, String)> {
        let provider_id = self.settings.default_provider.clone().or_else(|| {
            self.providers
                .iter()
                .find(|provider| provider.is_active)
                .map(|provider| provider.id.clone())
        })?;

        let model_id = self.settings.default_model.clone().or_else(|| {
            self.models
                .iter()
                .find(|model| model.is_active && model.provider_id == provider_id)
                .map(|model| model.id.clone())
        })?;

        Some((provider_id, model_id))
    }
}

/// Read-only source of provider and model records
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn provider(&self, id: &str) -> Option<ProviderConfig>;

    async fn model(&self, id: &str) -> Option<ModelConfig>;
}

/// Records loaded once and held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    providers: HashMap<String, ProviderConfig>,
    models: HashMap<String, ModelConfig>,
}

impl StaticConfigStore {
    pub fn new(providers: Vec<ProviderConfig>, models: Vec<ModelConfig>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| (provider.id.clone(), provider))
                .collect(),
            models: models
                .into_iter()
                .map(|model| (model.id.clone(), model))
                .collect(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.providers.clone(), config.models.clone())
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn provider(&self, id: &str) -> Option<ProviderConfig> {
        self.providers.get(id).cloned()
    }

    async fn model(&self, id: &str) -> Option<ModelConfig> {
        self.models.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ProviderKind, StreamMode};

    const SAMPLE: &str = r#"
[settings]
enable_caching = false
default_provider = "local"

[[providers]]
id = "local"
kind = "ollama"
base_url = "http://localhost:11434/"

[[providers]]
id = "other"
kind = "mistral"
base_url = "https://llm.example.com/v1"
api_key = "sk-test"
max_retries = 5

[[models]]
id = "deepseek"
provider_id = "local"
name = "deepseek-r1:7b"
stream_mode = "collect"

[[templates]]
name = "summarize"
language = "en"
prompt_type = "system"
template = "Summarize in {style} style."
is_default = true
"#;

    #[test]
    fn test_parse_sample() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();

        assert!(!config.settings.enable_caching);
        assert_eq!(config.settings.cache_ttl_secs, 3600);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::Ollama);
        assert_eq!(config.providers[0].timeout_secs, 30);
        assert_eq!(config.providers[1].kind, ProviderKind::Generic);
        assert_eq!(config.providers[1].max_attempts(), 5);
        assert_eq!(config.models[0].stream_mode, StreamMode::Collect);
        assert_eq!(config.models[0].max_tokens, None);
        assert_eq!(config.templates[0].name, "summarize");
    }

    #[test]
    fn test_default_target() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.default_target(),
            Some(("local".to_string(), "deepseek".to_string()))
        );

        assert_eq!(GatewayConfig::default().default_target(), None);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        let serialized = config.to_toml_string().unwrap();
        let reparsed = GatewayConfig::from_toml_str(&serialized).unwrap();

        assert_eq!(reparsed.settings, config.settings);
        assert_eq!(reparsed.models[0].name, "deepseek-r1:7b");
    }

    #[tokio::test]
    async fn test_static_store_lookup() {
        let config = GatewayConfig::from_toml_str(SAMPLE).unwrap();
        let store = StaticConfigStore::from_config(&config);

        assert!(store.provider("local").await.is_some());
        assert!(store.provider("missing").await.is_none());
        assert_eq!(
            store.model("deepseek").await.map(|model| model.provider_id),
            Some("local".to_string())
        );
    }
}
