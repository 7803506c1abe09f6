//! Provider request shaping.
//!
//! Pure functions from `(provider, model, messages, options)` to the wire
//! request. Each [`ProviderKind`] owns one entry in the dispatch table below,
//! so adding a provider family touches this file and the extractor only.

use serde_json::{Value, json};
use url::Url;

use crate::llm::error::GatewayError;
use crate::llm::types::{HttpRequest, Message, ModelConfig, ProviderConfig, ProviderKind};

/// Sampling parameters after defaults have been applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How a provider family authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthScheme {
    Bearer,
    ApiKeyHeader,
    None,
}

/// Where sampling parameters live in the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyShape {
    Flat,
    NestedOptions,
}

struct ProviderProfile {
    auth: AuthScheme,
    body: BodyShape,
}

fn profile_for(kind: ProviderKind) -> ProviderProfile {
    match kind {
        ProviderKind::OpenAI | ProviderKind::Google | ProviderKind::Generic => ProviderProfile {
            auth: AuthScheme::Bearer,
            body: BodyShape::Flat,
        },
        ProviderKind::Anthropic => ProviderProfile {
            auth: AuthScheme::ApiKeyHeader,
            body: BodyShape::Flat,
        },
        ProviderKind::Ollama => ProviderProfile {
            auth: AuthScheme::None,
            body: BodyShape::NestedOptions,
        },
    }
}

/// Endpoint for a provider family, with trailing slashes on the base removed
pub fn endpoint_url(provider: &ProviderConfig, model: &ModelConfig) -> String {
    let base = provider.base_url.trim_end_matches('/');
    match provider.kind {
        ProviderKind::OpenAI => format!("{base}/v1/chat/completions"),
        ProviderKind::Anthropic => format!("{base}/v1/messages"),
        ProviderKind::Google => format!("{base}/v1/models/{}:generateContent", model.name),
        ProviderKind::Ollama => format!("{base}/api/chat"),
        ProviderKind::Generic => format!("{base}/chat/completions"),
    }
}

pub fn build_headers(provider: &ProviderConfig) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ];

    let api_key = provider.api_key.as_deref().filter(|key| !key.is_empty());
    match (profile_for(provider.kind).auth, api_key) {
        (AuthScheme::Bearer, Some(key)) => {
            headers.push(("Authorization".to_string(), format!("Bearer {key}")));
        }
        (AuthScheme::ApiKeyHeader, Some(key)) => {
            headers.push(("x-api-key".to_string(), key.to_string()));
        }
        _ => {}
    }

    if provider.kind == ProviderKind::Anthropic {
        headers.push((
            "anthropic-version".to_string(),
            ANTHROPIC_VERSION.to_string(),
        ));
    }

    headers
}

pub fn build_body(
    provider: &ProviderConfig,
    model: &ModelConfig,
    messages: &[Message],
    params: SamplingParams,
) -> Value {
    match profile_for(provider.kind).body {
        BodyShape::NestedOptions => json!({
            "model": model.name,
            "messages": messages,
            "stream": params.stream,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        }),
        BodyShape::Flat => json!({
            "model": model.name,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": params.stream,
        }),
    }
}

/// Shape the complete wire request. No network access happens here.
pub fn build_request(
    provider: &ProviderConfig,
    model: &ModelConfig,
    messages: &[Message],
    params: SamplingParams,
) -> Result<HttpRequest, GatewayError> {
    let url = endpoint_url(provider, model);
    Url::parse(&url).map_err(|e| {
        GatewayError::InvalidRequest(format!(
            "provider '{}' has an invalid base URL '{}': {e}",
            provider.id, provider.base_url
        ))
    })?;

    Ok(HttpRequest {
        url,
        headers: build_headers(provider),
        body: build_body(provider, model, messages, params),
        timeout: provider.timeout(),
    })
}
