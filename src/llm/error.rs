//! Gateway error taxonomy.
//!
//! Every public gateway operation fails with exactly one [`GatewayError`].
//! Callers branch on [`GatewayError::code`] and read structured context from
//! [`GatewayError::details`] instead of parsing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::llm::types::ProviderKind;

/// Stable, machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    ResponseParseError,
    MissingVariable,
    NoPromptAvailable,
    NotSupported,
    InvalidRequest,
    StreamError,
    Cancelled,
    GenerationFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ResponseParseError => "RESPONSE_PARSE_ERROR",
            ErrorCode::MissingVariable => "MISSING_VARIABLE",
            ErrorCode::NoPromptAvailable => "NO_PROMPT_AVAILABLE",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::StreamError => "STREAM_ERROR",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::GenerationFailure => "GENERATION_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single transport attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// Connection refused, reset, DNS failure and similar
    Connect(String),
    Timeout(String),
    /// Non-2xx status
    Status(u16),
    EmptyResponse,
    /// Body was not valid JSON
    Parse(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Connect(message) => write!(f, "connection error: {message}"),
            AttemptFailure::Timeout(message) => write!(f, "request timed out: {message}"),
            AttemptFailure::Status(status) => write!(f, "HTTP status {status}"),
            AttemptFailure::EmptyResponse => f.write_str("Empty response from LLM service"),
            AttemptFailure::Parse(message) => write!(f, "invalid JSON response: {message}"),
        }
    }
}

/// One failed attempt, kept for the final report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub index: u32,
    pub elapsed: Duration,
    pub status: Option<u16>,
    pub failure: AttemptFailure,
    pub response_snippet: String,
}

/// Diagnostic bundle attached to a `NETWORK_ERROR`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub provider: ProviderKind,
    pub url: String,
    pub status: Option<u16>,
    pub response_snippet: String,
    pub error: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub failed_at: DateTime<Utc>,
    pub history: Vec<RetryAttempt>,
}

impl FailureReport {
    pub fn details(&self) -> BTreeMap<String, Value> {
        let mut details = BTreeMap::new();
        details.insert("provider".to_string(), json!(self.provider.as_str()));
        details.insert("url".to_string(), json!(self.url));
        details.insert("status".to_string(), json!(self.status));
        details.insert("response".to_string(), json!(self.response_snippet));
        details.insert("error".to_string(), json!(self.error));
        details.insert("attempts".to_string(), json!(self.attempts));
        details.insert(
            "duration".to_string(),
            json!(format!("{:.2}s", self.elapsed.as_secs_f64())),
        );
        details
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("LLM service request failed after {} attempts: {}", .0.attempts, .0.error)]
    Network(Box<FailureReport>),

    #[error("Failed to extract content from {provider} response: {message}")]
    ResponseParse {
        provider: ProviderKind,
        message: String,
        snippet: String,
    },

    #[error("Missing required variable '{variable}' for prompt template '{template}'")]
    MissingVariable { template: String, variable: String },

    #[error("No prompt template available for '{name}' in {language} ({prompt_type})")]
    NoPromptAvailable {
        name: String,
        language: String,
        prompt_type: String,
    },

    #[error("Direct streaming is not supported for {provider} model '{model}'")]
    NotSupported { provider: ProviderKind, model: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Streaming from {url} failed: {message}")]
    Stream { url: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{message}")]
    GenerationFailure {
        message: String,
        details: BTreeMap<String, Value>,
        #[source]
        source: Option<Box<GatewayError>>,
    },
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Network(_) => ErrorCode::NetworkError,
            GatewayError::ResponseParse { .. } => ErrorCode::ResponseParseError,
            GatewayError::MissingVariable { .. } => ErrorCode::MissingVariable,
            GatewayError::NoPromptAvailable { .. } => ErrorCode::NoPromptAvailable,
            GatewayError::NotSupported { .. } => ErrorCode::NotSupported,
            GatewayError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            GatewayError::Stream { .. } => ErrorCode::StreamError,
            GatewayError::Cancelled => ErrorCode::Cancelled,
            GatewayError::GenerationFailure { .. } => ErrorCode::GenerationFailure,
        }
    }

    pub fn details(&self) -> BTreeMap<String, Value> {
        match self {
            GatewayError::Network(report) => report.details(),
            GatewayError::ResponseParse {
                provider, snippet, ..
            } => BTreeMap::from([
                ("provider".to_string(), json!(provider.as_str())),
                ("response".to_string(), json!(snippet)),
            ]),
            GatewayError::MissingVariable { template, variable } => BTreeMap::from([
                ("template".to_string(), json!(template)),
                ("variable".to_string(), json!(variable)),
            ]),
            GatewayError::NoPromptAvailable {
                name,
                language,
                prompt_type,
            } => BTreeMap::from([
                ("prompt_name".to_string(), json!(name)),
                ("language".to_string(), json!(language)),
                ("prompt_type".to_string(), json!(prompt_type)),
            ]),
            GatewayError::NotSupported { provider, model } => BTreeMap::from([
                ("provider".to_string(), json!(provider.as_str())),
                ("model".to_string(), json!(model)),
            ]),
            GatewayError::Stream { url, message } => BTreeMap::from([
                ("url".to_string(), json!(url)),
                ("error".to_string(), json!(message)),
            ]),
            GatewayError::InvalidRequest(message) => {
                BTreeMap::from([("error".to_string(), json!(message))])
            }
            GatewayError::Cancelled => BTreeMap::new(),
            GatewayError::GenerationFailure { details, .. } => details.clone(),
        }
    }

    /// Wrap `cause` with extra context, keeping its code and details
    pub fn wrap(
        message: impl Into<String>,
        cause: GatewayError,
        context: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut details: BTreeMap<String, Value> = context.into_iter().collect();
        details.insert("original_code".to_string(), json!(cause.code().as_str()));
        for (key, value) in cause.details() {
            details.entry(key).or_insert(value);
        }
        GatewayError::GenerationFailure {
            message: message.into(),
            details,
            source: Some(Box::new(cause)),
        }
    }

    /// Code of the innermost wrapped error
    pub fn root_code(&self) -> ErrorCode {
        match self {
            GatewayError::GenerationFailure {
                source: Some(source),
                ..
            } => source.root_code(),
            other => other.code(),
        }
    }
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
