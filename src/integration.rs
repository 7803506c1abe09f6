//! # Prompted Generation
//!
//! Ties the prompt layer to the gateway: a caller names a prompt template and
//! supplies free text, and gets back generated text.
//!
//! ```text
//! user input ──► language detection ──► PromptResolver ──► system prompt
//!                                                             │
//!                    [system, user] ──► LlmGateway ──► text / fragments
//! ```
//!
//! Prompt resolution and rendering failures surface as they are
//! (`NO_PROMPT_AVAILABLE`, `MISSING_VARIABLE`). Gateway failures are wrapped
//! in a `GENERATION_FAILURE` carrying the prompt name, the language and the
//! original error code.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use llm_gateway::{GatewayConfig, GenerationService, PromptRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::from_toml_file("llm-gateway.toml")?;
//!     let service = GenerationService::from_config(&config).await;
//!
//!     let request = PromptRequest::new("general_assistant", "Explain ownership in Rust")
//!         .with_variable("audience", "beginners");
//!     let text = service
//!         .generate_with_prompt(&request, &CancellationToken::new())
//!         .await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{GatewayConfig, StaticConfigStore};
use crate::llm::error::GatewayError;
use crate::llm::gateway::{LlmGateway, TextStream};
use crate::llm::types::{GenerationOptions, GenerationRequest, Message, Variables};
use crate::prompt::language;
use crate::prompt::resolver::PromptResolver;
use crate::prompt::store::{InMemoryTemplateStore, PromptType};

/// A generation driven by a named prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub prompt_name: String,
    pub user_input: String,
    /// Detected from `user_input` when absent
    pub language: Option<String>,
    pub variables: Variables,
    /// Provider and model ids; the configured defaults when absent
    pub target: Option<(String, String)>,
    pub options: GenerationOptions,
}

impl PromptRequest {
    pub fn new(prompt_name: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            prompt_name: prompt_name.into(),
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_target(
        mut self,
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        self.target = Some((provider_id.into(), model_id.into()));
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct GenerationService {
    gateway: Arc<LlmGateway>,
    resolver: Arc<PromptResolver>,
    default_target: Option<(String, String)>,
}

impl GenerationService {
    pub fn new(
        gateway: Arc<LlmGateway>,
        resolver: Arc<PromptResolver>,
        default_target: Option<(String, String)>,
    ) -> Self {
        Self {
            gateway,
            resolver,
            default_target,
        }
    }

    /// Service over the HTTP transport with the templates held in `config`
    pub async fn from_config(config: &GatewayConfig) -> Self {
        let store = Arc::new(StaticConfigStore::from_config(config));
        let gateway = LlmGateway::with_http(store, config.settings.clone());
        let templates =
            Arc::new(InMemoryTemplateStore::from_templates(config.templates.clone()).await);
        let resolver = PromptResolver::from_settings(templates, &config.settings);

        Self::new(
            Arc::new(gateway),
            Arc::new(resolver),
            config.default_target(),
        )
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.gateway
    }

    pub fn resolver(&self) -> &PromptResolver {
        &self.resolver
    }

    pub async fn generate_with_prompt(
        &self,
        prompt: &PromptRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let (language, request) = self.prepare(prompt).await?;
        info!(
            "Generating with prompt '{}' ({}) on {}/{}",
            prompt.prompt_name, language, request.provider_id, request.model_id
        );

        self.gateway
            .generate(&request, cancel)
            .await
            .map_err(|e| {
                error!("Generation with prompt failed: {} - {}", prompt.prompt_name, e);
                wrap_failure("Text generation", &prompt.prompt_name, &language, e)
            })
    }

    pub async fn stream_with_prompt(
        &self,
        prompt: &PromptRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, GatewayError> {
        let (language, request) = self.prepare(prompt).await?;
        info!(
            "Streaming with prompt '{}' ({}) on {}/{}",
            prompt.prompt_name, language, request.provider_id, request.model_id
        );

        let prompt_name = prompt.prompt_name.clone();
        let fragments = self
            .gateway
            .stream(&request, cancel)
            .await
            .map_err(|e| wrap_failure("Stream generation", &prompt_name, &language, e))?;

        Ok(fragments
            .map(move |fragment| {
                fragment.map_err(|e| {
                    error!("Streaming with prompt failed: {} - {}", prompt_name, e);
                    wrap_failure("Stream generation", &prompt_name, &language, e)
                })
            })
            .boxed())
    }

    /// Language and the two-message request for `prompt`
    async fn prepare(
        &self,
        prompt: &PromptRequest,
    ) -> Result<(String, GenerationRequest), GatewayError> {
        let language = prompt
            .language
            .clone()
            .unwrap_or_else(|| language::detect(&prompt.user_input).to_string());

        let system_prompt = self
            .resolver
            .render(
                &prompt.prompt_name,
                &language,
                PromptType::System,
                &prompt.variables,
            )
            .await?;

        let (provider_id, model_id) = prompt
            .target
            .clone()
            .or_else(|| self.default_target.clone())
            .ok_or_else(|| {
                GatewayError::InvalidRequest("no provider and model configured".to_string())
            })?;

        let request = GenerationRequest::new(
            provider_id,
            model_id,
            vec![
                Message::system(system_prompt),
                Message::user(prompt.user_input.clone()),
            ],
        )
        .with_options(prompt.options.clone());

        Ok((language, request))
    }
}

fn wrap_failure(
    action: &str,
    prompt_name: &str,
    language: &str,
    cause: GatewayError,
) -> GatewayError {
    GatewayError::wrap(
        format!("{action} using prompt '{prompt_name}' failed"),
        cause,
        [
            ("prompt_name".to_string(), json!(prompt_name)),
            ("language".to_string(), json!(language)),
        ],
    )
}
