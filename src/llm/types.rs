use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::env;

/// Supported provider wire families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions
    OpenAI,
    /// Anthropic-compatible messages API
    Anthropic,
    /// Google-compatible generateContent API
    Google,
    /// Local Ollama-compatible chat API
    Ollama,
    /// Anything else; served from `{base}/chat/completions`
    #[serde(other)]
    Generic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend record, read-only to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempt budget for buffered calls (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            cache_ttl_secs: None,
            is_active: true,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Attempts for a buffered call, never less than one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// How a model's `stream=true` responses may be consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Chunks can be handed to callers as they arrive
    #[default]
    Incremental,
    /// Chunks must be collected and sanitized as a whole before use
    Collect,
}

/// Model record, paired with exactly one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub provider_id: String,
    /// Wire identifier sent to the provider
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    #[serde(default)]
    pub stream_mode: StreamMode,
    /// Overrides the gateway-wide default when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ModelConfig {
    pub fn new(
        id: impl Into<String>,
        provider_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            display_name: name.clone(),
            name,
            supports_streaming: true,
            stream_mode: StreamMode::Incremental,
            max_tokens: None,
            temperature: None,
            is_active: true,
        }
    }

    pub fn with_stream_mode(mut self, stream_mode: StreamMode) -> Self {
        self.stream_mode = stream_mode;
        self
    }

    /// Whether chunk-by-chunk streaming is safe for this model
    pub fn streams_incrementally(&self) -> bool {
        self.supports_streaming && self.stream_mode == StreamMode::Incremental
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Per-call overrides; unset fields fall back to model, then global defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: Option<bool>,
}

/// Inbound request to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub provider_id: String,
    pub model_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            messages,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Fully shaped wire request produced by the adapter
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw HTTP result before any interpretation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Template variables supplied by callers
pub type Variables = HashMap<String, String>;

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    env::defaults::PROVIDER_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    env::defaults::MAX_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_maps_to_generic() {
        let kind: ProviderKind = serde_json::from_str("\"deepinfra\"").unwrap();
        assert_eq!(kind, ProviderKind::Generic);
        let kind: ProviderKind = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(kind, ProviderKind::Ollama);
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        let provider =
            ProviderConfig::new("p", ProviderKind::OpenAI, "http://x").with_max_retries(0);
        assert_eq!(provider.max_attempts(), 1);
    }

    #[test]
    fn test_collect_mode_disables_incremental_streaming() {
        let model = ModelConfig::new("m", "p", "deepseek-r1").with_stream_mode(StreamMode::Collect);
        assert!(!model.streams_incrementally());

        let mut model = ModelConfig::new("m", "p", "llama3");
        assert!(model.streams_incrementally());
        model.supports_streaming = false;
        assert!(!model.streams_incrementally());
    }
}
