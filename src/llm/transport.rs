//! HTTP transport with bounded retry.
//!
//! [`Transport`] is the seam between the gateway and the network: the
//! production implementation is [`HttpTransport`] (reqwest), tests plug in
//! in-process doubles. Retry and backoff live in [`RetryExecutor`] and apply
//! to buffered calls only; streaming opens exactly one connection.

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::env::defaults::RESPONSE_SNIPPET_CHARS;
use crate::llm::error::{
    AttemptFailure, FailureReport, GatewayError, RetryAttempt, truncate_chars,
};
use crate::llm::types::{HttpRequest, ProviderKind, RawResponse};

/// Line-framed body of a streaming response
pub type LineStream = BoxStream<'static, Result<String, TransportError>>;

/// Failure below HTTP semantics
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Streaming endpoint answered with a non-2xx status
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    /// The request could not be built; never retried
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Connect(error.to_string())
        }
    }
}

/// Network seam for the gateway
pub trait Transport: Send + Sync {
    /// Send one request and return the complete response body
    fn send<'a>(&'a self, request: &'a HttpRequest)
    -> BoxFuture<'a, Result<RawResponse, TransportError>>;

    /// Open one streaming connection and yield its body line by line
    fn open_stream<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<LineStream, TransportError>>;
}

/// reqwest-backed transport
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn prepare(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        // Content-Type is already set above, so json() only writes the body
        builder.json(&request.body)
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let response = self
                .prepare(request)
                .timeout(request.timeout)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(RawResponse { status, body })
        })
    }

    fn open_stream<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<LineStream, TransportError>> {
        Box::pin(async move {
            // Only the response head is bounded; the body may stream for as long as it runs
            let response = tokio::time::timeout(request.timeout, self.prepare(request).send())
                .await
                .map_err(|_| {
                    TransportError::Timeout(format!(
                        "no response from {} within {}s",
                        request.url,
                        request.timeout.as_secs()
                    ))
                })??;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: truncate_chars(&body, RESPONSE_SNIPPET_CHARS),
                });
            }

            let bytes = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from));
            Ok(frame_lines(bytes).boxed())
        })
    }
}

/// Split a byte stream into `\n`-terminated lines without reordering.
///
/// A trailing line without a terminator is flushed when the source ends.
pub fn frame_lines<S, B>(source: S) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    S: Stream<Item = Result<B, TransportError>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        // Bytes of `buffer` already known to hold no newline
        let mut scanned = 0;
        futures::pin_mut!(source);
        while let Some(chunk) = source.next().await {
            buffer.extend_from_slice(chunk?.as_ref());
            let mut start = 0;
            while let Some(offset) = buffer[scanned..].iter().position(|b| *b == b'\n') {
                let end = scanned + offset + 1;
                yield decode_line(&buffer[start..end]);
                start = end;
                scanned = end;
            }
            buffer.drain(..start);
            scanned = buffer.len();
        }
        if !buffer.is_empty() {
            yield decode_line(&buffer);
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Backoff before retrying after the attempt with 0-based `index`
pub fn backoff_delay(index: u32) -> Duration {
    Duration::from_secs_f64(2f64.powi(index as i32) + 0.1)
}

/// Runs buffered requests with bounded retry and exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    pub max_attempts: u32,
}

impl RetryExecutor {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Send `request` until it yields a non-empty JSON body or the attempt
    /// budget is spent. The backoff sleep stops early when `cancel` fires.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        provider: ProviderKind,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, GatewayError> {
        let started = Instant::now();
        let mut history: Vec<RetryAttempt> = Vec::new();

        for index in 0..self.max_attempts {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                outcome = transport.send(request) => outcome,
            };

            let (failure, status, body) = match outcome {
                Ok(response) => match interpret(&response) {
                    Ok(value) => return Ok(value),
                    Err(failure) => (failure, Some(response.status), response.body),
                },
                Err(TransportError::InvalidRequest(message)) => {
                    return Err(GatewayError::InvalidRequest(message));
                }
                Err(TransportError::Timeout(message)) => {
                    (AttemptFailure::Timeout(message), None, String::new())
                }
                Err(TransportError::Connect(message)) => {
                    (AttemptFailure::Connect(message), None, String::new())
                }
                Err(TransportError::Status { status, body }) => {
                    (AttemptFailure::Status(status), Some(status), body)
                }
            };

            let elapsed = started.elapsed();
            history.push(RetryAttempt {
                index,
                elapsed,
                status,
                failure: failure.clone(),
                response_snippet: truncate_chars(&body, RESPONSE_SNIPPET_CHARS),
            });

            if index + 1 == self.max_attempts {
                break;
            }

            let delay = backoff_delay(index);
            warn!(
                "Retry {} after {:.1}s: {}\nDuration: {:.2}s",
                index + 1,
                delay.as_secs_f64(),
                failure,
                elapsed.as_secs_f64()
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let report = build_report(provider, &request.url, history, started.elapsed());
        error!(
            "LLM request failed:\n{}",
            report
                .details()
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        Err(GatewayError::Network(Box::new(report)))
    }
}

/// Classify a complete response as usable JSON or a retryable failure
fn interpret(response: &RawResponse) -> Result<Value, AttemptFailure> {
    if !response.is_success() {
        return Err(AttemptFailure::Status(response.status));
    }
    if response.body.trim().is_empty() {
        return Err(AttemptFailure::EmptyResponse);
    }
    serde_json::from_str(&response.body).map_err(|e| AttemptFailure::Parse(e.to_string()))
}

fn build_report(
    provider: ProviderKind,
    url: &str,
    history: Vec<RetryAttempt>,
    elapsed: Duration,
) -> FailureReport {
    let last = history.last();
    FailureReport {
        provider,
        url: url.to_string(),
        status: last.and_then(|attempt| attempt.status),
        response_snippet: last
            .map(|attempt| attempt.response_snippet.clone())
            .unwrap_or_default(),
        error: last
            .map(|attempt| attempt.failure.to_string())
            .unwrap_or_default(),
        attempts: history.len() as u32,
        elapsed,
        failed_at: chrono::Utc::now(),
        history,
    }
}
