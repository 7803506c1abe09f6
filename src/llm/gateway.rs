//! Gateway orchestration: adapter → transport → extractor, plus the
//! response cache.
//!
//! Buffered calls go through [`RetryExecutor`]; streaming calls open one
//! connection and never retry. Models configured with
//! [`StreamMode::Collect`] are served by collecting their stream into a single
//! sanitized string and are refused by [`LlmGateway::stream`].

use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConfigStore, GatewaySettings};
use crate::llm::adapter::{self, SamplingParams};
use crate::llm::cache::{ResponseCache, ResponseKey};
use crate::llm::error::GatewayError;
use crate::llm::extract::{self, StreamEvent};
use crate::llm::request_log;
use crate::llm::transport::{
    HttpTransport, LineStream, RetryExecutor, Transport, TransportError,
};
use crate::llm::types::{
    GenerationOptions, GenerationRequest, HttpRequest, Message, MessageRole, ModelConfig,
    ProviderConfig, StreamMode,
};

/// Text fragments of a streamed generation, in arrival order
pub type TextStream = BoxStream<'static, Result<String, GatewayError>>;

pub struct LlmGateway {
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    settings: GatewaySettings,
}

impl LlmGateway {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            store,
            transport,
            cache: Arc::new(ResponseCache::new()),
            settings,
        }
    }

    /// Gateway over the reqwest transport
    pub fn with_http(store: Arc<dyn ConfigStore>, settings: GatewaySettings) -> Self {
        Self::new(store, Arc::new(HttpTransport::new()), settings)
    }

    /// Share a response cache between gateways
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Generate a complete, sanitized response.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        validate_messages(&request.messages)?;
        let (provider, model) = self.resolve_target(request).await?;

        let key = ResponseKey::new(&provider.id, &model.id, &request.messages);
        if self.settings.enable_caching {
            if let Some(cached) = self.cache.get(&key) {
                debug!("Response cache hit for {}/{}", provider.id, model.id);
                return Ok(cached);
            }
        }

        let started = Instant::now();
        let wants_stream = request
            .options
            .stream
            .unwrap_or(self.settings.enable_streaming);
        let collect = wants_stream
            && model.supports_streaming
            && model.stream_mode == StreamMode::Collect;

        let result = if collect {
            self.generate_collected(&provider, &model, request, cancel).await
        } else {
            self.generate_buffered(&provider, &model, request, cancel).await
        };

        match result {
            Ok(content) => {
                info!(
                    "Generated {} chars with {}/{} in {:.2}s",
                    content.len(),
                    provider.id,
                    model.name,
                    started.elapsed().as_secs_f64()
                );
                if self.settings.enable_caching && !content.is_empty() {
                    let ttl = provider
                        .cache_ttl_secs
                        .unwrap_or(self.settings.cache_ttl_secs);
                    self.cache.insert(key, content.clone(), Duration::from_secs(ttl));
                }
                Ok(content)
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Stream raw text fragments as they arrive.
    ///
    /// Fragments are not sanitized; models whose output must be sanitized as
    /// a whole are refused with `NOT_SUPPORTED`.
    pub async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, GatewayError> {
        validate_messages(&request.messages)?;
        let (provider, model) = self.resolve_target(request).await?;

        if !model.streams_incrementally() {
            return Err(GatewayError::NotSupported {
                provider: provider.kind,
                model: model.name.clone(),
            });
        }

        let http = self.shape(&provider, &model, &request.messages, &request.options, true)?;
        let kind = provider.kind;
        let url = http.url.clone();
        let mut lines = self.open_stream(&http, &cancel).await?;

        let fragments = async_stream::try_stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(GatewayError::Cancelled),
                    next = lines.next() => Ok(next),
                };
                let Some(line) = next? else { break };
                let line = line.map_err(|e| stream_error(&url, e))?;
                match extract::parse_stream_line(kind, &line) {
                    StreamEvent::Fragment(fragment) => yield fragment,
                    StreamEvent::Done => break,
                    StreamEvent::Skip => {}
                }
            }
        };

        Ok(fragments.boxed())
    }

    async fn generate_buffered(
        &self,
        provider: &ProviderConfig,
        model: &ModelConfig,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let http = self.shape(provider, model, &request.messages, &request.options, false)?;
        let response = RetryExecutor::new(provider.max_attempts())
            .execute(self.transport.as_ref(), provider.kind, &http, cancel)
            .await?;
        extract::extract_content(provider.kind, &response)
    }

    /// One streaming connection, every fragment accumulated, sanitized once.
    async fn generate_collected(
        &self,
        provider: &ProviderConfig,
        model: &ModelConfig,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let http = self.shape(provider, model, &request.messages, &request.options, true)?;
        let mut lines = self.open_stream(&http, cancel).await?;

        let mut content = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                next = lines.next() => next,
            };
            let Some(line) = next else { break };
            let line = line.map_err(|e| stream_error(&http.url, e))?;
            match extract::parse_stream_line(provider.kind, &line) {
                StreamEvent::Fragment(fragment) => content.push_str(&fragment),
                StreamEvent::Done => break,
                StreamEvent::Skip => {}
            }
        }

        Ok(extract::sanitize(&content))
    }

    fn shape(
        &self,
        provider: &ProviderConfig,
        model: &ModelConfig,
        messages: &[Message],
        options: &GenerationOptions,
        stream: bool,
    ) -> Result<HttpRequest, GatewayError> {
        let params = SamplingParams {
            temperature: options
                .temperature
                .or(model.temperature)
                .unwrap_or(self.settings.default_temperature),
            max_tokens: options
                .max_tokens
                .or(model.max_tokens)
                .unwrap_or(self.settings.default_max_tokens),
            stream,
        };
        let http = adapter::build_request(provider, model, messages, params)?;
        request_log::log_request(provider, model, &http);
        Ok(http)
    }

    async fn open_stream(
        &self,
        http: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<LineStream, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            opened = self.transport.open_stream(http) => {
                opened.map_err(|e| stream_error(&http.url, e))
            }
        }
    }

    async fn resolve_target(
        &self,
        request: &GenerationRequest,
    ) -> Result<(ProviderConfig, ModelConfig), GatewayError> {
        let provider = self
            .store
            .provider(&request.provider_id)
            .await
            .filter(|provider| provider.is_active)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!(
                    "unknown or inactive provider '{}'",
                    request.provider_id
                ))
            })?;

        let model = self
            .store
            .model(&request.model_id)
            .await
            .filter(|model| model.is_active)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!(
                    "unknown or inactive model '{}'",
                    request.model_id
                ))
            })?;

        if model.provider_id != provider.id {
            return Err(GatewayError::InvalidRequest(format!(
                "model '{}' belongs to provider '{}', not '{}'",
                model.id, model.provider_id, provider.id
            )));
        }

        Ok((provider, model))
    }
}

/// Accept `[user]` or `[system, user]`
pub fn validate_messages(messages: &[Message]) -> Result<(), GatewayError> {
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    match roles.as_slice() {
        [MessageRole::User] | [MessageRole::System, MessageRole::User] => Ok(()),
        [] => Err(GatewayError::InvalidRequest(
            "messages must not be empty".to_string(),
        )),
        _ => Err(GatewayError::InvalidRequest(format!(
            "expected an optional system message followed by one user message, got [{}]",
            roles
                .iter()
                .map(MessageRole::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn stream_error(url: &str, error: TransportError) -> GatewayError {
    match error {
        TransportError::InvalidRequest(message) => GatewayError::InvalidRequest(message),
        other => GatewayError::Stream {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}
