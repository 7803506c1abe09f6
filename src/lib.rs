//! # LLM Gateway
//!
//! A provider-agnostic client for text generation across heterogeneous LLM
//! backends, with a template-driven prompt layer on top.
//!
//! ## Architecture Overview
//!
//! - **[`llm`]**: request shaping per provider family, HTTP transport with
//!   bounded retry, streaming, response extraction and sanitization, the
//!   response cache and the [`LlmGateway`] that orchestrates them
//! - **[`prompt`]**: template storage contract, resolution with default and
//!   English fallback, placeholder rendering, language detection
//! - **[`integration`]**: prompted generation combining both layers
//! - **[`config`]**: TOML configuration and the provider/model record store
//!
//! ## Features
//!
//! ### 🔌 Provider Families
//! - OpenAI, Anthropic, Google and Ollama wire formats, plus an
//!   OpenAI-compatible fallback for anything else
//! - Per-family endpoint, authentication header and body shape
//!
//! ### 🔁 Reliable Transport
//! - Up to three attempts with `2^i + 0.1` second backoff
//! - A single structured report when every attempt fails
//! - Cancellation of backoff sleeps and open streams
//!
//! ### 📝 Prompt Templates
//! - Named, language-scoped templates with per-language defaults
//! - Positive and negative lookup caching
//! - Missing variables are errors, never literal placeholders
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_gateway::{GatewayConfig, GenerationService, PromptRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::from_toml_str(r#"
//!         [[providers]]
//!         id = "local"
//!         kind = "ollama"
//!         base_url = "http://localhost:11434"
//!
//!         [[models]]
//!         id = "qwen"
//!         provider_id = "local"
//!         name = "qwen2.5:7b"
//!
//!         [[templates]]
//!         name = "general_assistant"
//!         language = "en"
//!         prompt_type = "system"
//!         template = "You are a helpful assistant."
//!         is_default = true
//!     "#)?;
//!
//!     let service = GenerationService::from_config(&config).await;
//!     let request = PromptRequest::new("general_assistant", "What is a monad?");
//!     let answer = service
//!         .generate_with_prompt(&request, &CancellationToken::new())
//!         .await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

/// Provider-agnostic LLM access.
///
/// Adapter, transport, extractor and cache, composed by [`LlmGateway`].
pub mod llm;

/// Prompt templates, resolution and language detection.
pub mod prompt;

/// Prompted generation on top of the gateway.
pub mod integration;

/// Gateway configuration and record stores.
pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes configuration file names, discovery paths and tuning defaults.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use config::{ConfigStore, GatewayConfig, GatewaySettings, StaticConfigStore};
pub use integration::{GenerationService, PromptRequest};
pub use llm::{
    ErrorCode, GatewayError, GenerationRequest, LlmGateway, Message, ModelConfig, ProviderConfig,
    ProviderKind,
};
pub use prompt::{PromptResolver, PromptTemplate, PromptType};
