//! Response extraction and output sanitization.
//!
//! Buffered responses are unwrapped along the field path of their provider
//! family; streamed responses are decoded one framed line at a time. All text
//! handed back to callers from the buffered paths goes through [`sanitize`].

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::env::defaults::RESPONSE_SNIPPET_CHARS;
use crate::llm::error::{GatewayError, truncate_chars};
use crate::llm::types::ProviderKind;

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*think\s*>.*?<\s*/\s*think\s*>").expect("valid think block pattern")
});

static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/?\s*think\s*>").expect("valid think tag pattern"));

const SSE_DATA_PREFIX: &str = "data:";
const STREAM_SENTINEL: &str = "[DONE]";

const CHOICES_CONTENT: &str = "/choices/0/message/content";
const MESSAGE_CONTENT: &str = "/message/content";
const CHOICES_DELTA: &str = "/choices/0/delta/content";
const ANTHROPIC_DELTA: &str = "/delta/text";

/// Pull the raw generated text out of a buffered response envelope.
pub fn extract_raw(kind: ProviderKind, response: &Value) -> Result<String, GatewayError> {
    let content = match kind {
        ProviderKind::Ollama => string_at(response, MESSAGE_CONTENT),
        ProviderKind::OpenAI | ProviderKind::Generic => string_at(response, CHOICES_CONTENT),
        ProviderKind::Anthropic => {
            string_at(response, CHOICES_CONTENT).or_else(|| joined_text(response.get("content")))
        }
        ProviderKind::Google => string_at(response, CHOICES_CONTENT).or_else(|| {
            joined_text(response.pointer("/candidates/0/content/parts"))
        }),
    };

    content.ok_or_else(|| GatewayError::ResponseParse {
        provider: kind,
        message: format!("expected content field missing for {kind} response"),
        snippet: truncate_chars(&response.to_string(), RESPONSE_SNIPPET_CHARS),
    })
}

/// Extract and sanitize a buffered response.
pub fn extract_content(kind: ProviderKind, response: &Value) -> Result<String, GatewayError> {
    extract_raw(kind, response).map(|text| sanitize(&text))
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer)?.as_str().map(str::to_string)
}

/// Concatenate the `text` fields of a block array
fn joined_text(blocks: Option<&Value>) -> Option<String> {
    let blocks = blocks?.as_array()?;
    let parts: Vec<&str> = blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}

/// What one framed stream line contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    /// The `[DONE]` sentinel
    Done,
    /// Blank, malformed, finished, or content-free line
    Skip,
}

pub fn parse_stream_line(kind: ProviderKind, line: &str) -> StreamEvent {
    let mut payload = line.trim();
    if let Some(rest) = payload.strip_prefix(SSE_DATA_PREFIX) {
        payload = rest.trim_start();
    }

    if payload.is_empty() {
        return StreamEvent::Skip;
    }
    if payload == STREAM_SENTINEL {
        return StreamEvent::Done;
    }

    let chunk: Value = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::trace!("Skipping malformed stream line: {}", e);
            return StreamEvent::Skip;
        }
    };

    if chunk.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return StreamEvent::Skip;
    }

    match stream_fragment(kind, &chunk) {
        Some(fragment) if !fragment.is_empty() => StreamEvent::Fragment(fragment),
        _ => StreamEvent::Skip,
    }
}

fn stream_fragment(kind: ProviderKind, chunk: &Value) -> Option<String> {
    if let Some(content) = string_at(chunk, MESSAGE_CONTENT) {
        return Some(content);
    }
    match kind {
        ProviderKind::Ollama => None,
        ProviderKind::Anthropic => string_at(chunk, ANTHROPIC_DELTA),
        ProviderKind::OpenAI | ProviderKind::Google | ProviderKind::Generic => {
            string_at(chunk, CHOICES_DELTA).or_else(|| string_at(chunk, CHOICES_CONTENT))
        }
    }
}

/// Concatenate the content of a sequence of stream lines, stopping at `[DONE]`.
pub fn collect_stream_lines<'a>(
    kind: ProviderKind,
    lines: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut content = String::new();
    for line in lines {
        match parse_stream_line(kind, line) {
            StreamEvent::Fragment(fragment) => content.push_str(&fragment),
            StreamEvent::Done => break,
            StreamEvent::Skip => {}
        }
    }
    content
}

/// Strip reasoning blocks and blank-line noise from model output.
pub fn sanitize(content: &str) -> String {
    let without_blocks = THINK_BLOCK.replace_all(content, "");
    let without_tags = THINK_TAG.replace_all(&without_blocks, "");

    without_tags
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Return the text from the first HTML document marker on, or the input
/// unchanged when it carries none.
pub fn extract_html(text: &str) -> &str {
    let start = text
        .find("<!DOCTYPE html>")
        .or_else(|| text.find("<html"));
    match start {
        Some(index) => text[index..].trim(),
        None => text,
    }
}
