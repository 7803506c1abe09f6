//! Request logging for provider interactions.
//!
//! Produces a readable rendering of an outgoing request for `debug` logs:
//! credentials are masked and long messages are shortened to their head and
//! tail so the log stays useful without dumping whole documents.

use serde_json::Value;
use tracing::debug;

use crate::env::defaults::LOG_MESSAGE_PREVIEW_CHARS;
use crate::llm::types::{HttpRequest, ModelConfig, ProviderConfig};

const MASK: &str = "*****";

const RULE: &str = "---------------------------";

fn is_credential_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "authorization" || name.contains("key")
}

/// Headers with credential values replaced by a mask
pub fn masked_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if is_credential_header(name) {
                (name.clone(), MASK.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Shorten `content` to its first and last halves of the preview budget
pub fn preview_content(content: &str) -> String {
    let length = content.chars().count();
    if length <= LOG_MESSAGE_PREVIEW_CHARS {
        return content.to_string();
    }
    let half = LOG_MESSAGE_PREVIEW_CHARS / 2;
    let head: String = content.chars().take(half).collect();
    let tail: String = content.chars().skip(length - half).collect();
    format!("{head} ... {tail}")
}

fn format_messages(body: &Value) -> String {
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return String::new();
    };

    messages
        .iter()
        .map(|message| {
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_uppercase();
            let content = message.get("content").and_then(Value::as_str).unwrap_or("");
            let length = content.chars().count();
            if length > LOG_MESSAGE_PREVIEW_CHARS {
                format!("{role} ({length} chars):\n{}", preview_content(content))
            } else {
                format!("{role}:\n{content}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n----------\n")
}

pub fn describe_request(
    provider: &ProviderConfig,
    model: &ModelConfig,
    request: &HttpRequest,
) -> String {
    let headers = masked_headers(&request.headers)
        .into_iter()
        .map(|(name, value)| format!("  {name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut body = request.body.clone();
    if let Some(object) = body.as_object_mut() {
        object.remove("messages");
    }

    format!(
        "Provider: {} ({})\n\
         Model: {}\n\
         {RULE}\n\
         URL: {}\n\
         Headers:\n{}\n\
         Parameters: {}\n\
         Messages:\n{}\n\
         {RULE}",
        provider.display_name(),
        provider.kind,
        model.name,
        request.url,
        headers,
        body,
        format_messages(&request.body)
    )
}

pub fn log_request(provider: &ProviderConfig, model: &ModelConfig, request: &HttpRequest) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!("Sending LLM request\n{}", describe_request(provider, model, request));
    }
}
