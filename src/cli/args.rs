//! Command line argument parsing
//!
//! Subcommands:
//! - `generate`: Generate a complete response with a named prompt
//! - `stream`: Stream a response with a named prompt
//! - `detect-language`: Guess the language of a text
//! - `render`: Render a prompt template without calling a provider
//! - `templates`: List configured prompt templates
//! - `show-config`: Show configuration discovery information

use crate::llm::types::Variables;
use crate::prompt::store::PromptType;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "llm-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provider-agnostic LLM gateway with prompt templates, retry and streaming")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by `generate` and `stream`
#[derive(Debug, Clone, ClapArgs)]
pub struct PromptArgs {
    /// Text sent as the user message
    pub input: String,
    /// Prompt template name
    #[arg(short = 'p', long = "prompt", default_value = "general_assistant")]
    pub prompt: String,
    /// Prompt language (detected from the input when omitted)
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,
    /// Template variable as KEY=VALUE (can be used multiple times)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
    pub vars: Vec<(String, String)>,
    /// Provider id (defaults to the configured default provider)
    #[arg(long = "provider", requires = "model")]
    pub provider: Option<String>,
    /// Model id (defaults to the configured default model)
    #[arg(long = "model", requires = "provider")]
    pub model: Option<String>,
    #[arg(long = "temperature")]
    pub temperature: Option<f32>,
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,
}

impl PromptArgs {
    pub fn variables(&self) -> Variables {
        self.vars.iter().cloned().collect()
    }

    pub fn target(&self) -> Option<(String, String)> {
        self.provider.clone().zip(self.model.clone())
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a complete response with a named prompt
    Generate {
        #[command(flatten)]
        prompt: PromptArgs,
        /// Print only the HTML document contained in the response
        #[arg(long = "html")]
        html: bool,
    },
    /// Stream a response with a named prompt
    Stream {
        #[command(flatten)]
        prompt: PromptArgs,
    },
    /// Guess the language of a text
    DetectLanguage {
        text: String,
        /// Print the detection report as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Render a prompt template without calling a provider
    Render {
        #[arg(short = 'p', long = "prompt")]
        prompt: String,
        #[arg(short = 'l', long = "language", default_value = "en")]
        language: String,
        #[arg(
            short = 't',
            long = "type",
            default_value = "system",
            value_parser = parse_prompt_type
        )]
        prompt_type: PromptType,
        /// Template variable as KEY=VALUE (can be used multiple times)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
        vars: Vec<(String, String)>,
    },
    /// List configured prompt templates
    Templates {
        #[arg(short = 'l', long = "language")]
        language: Option<String>,
        #[arg(short = 't', long = "type", value_parser = parse_prompt_type)]
        prompt_type: Option<PromptType>,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Write a default config file to the user config directory
        #[arg(long = "init")]
        init: bool,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_prompt_type(raw: &str) -> Result<PromptType, String> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_command() {
        let args = Args::try_parse_from([
            "llm-gateway",
            "generate",
            "Explain borrowing",
            "--prompt",
            "essay",
            "--var",
            "level=beginner",
            "--var",
            "format=a=b",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Generate { prompt, html } => {
                assert!(!html);
                assert_eq!(prompt.input, "Explain borrowing");
                assert_eq!(prompt.prompt, "essay");
                assert_eq!(prompt.language, None);
                let variables = prompt.variables();
                assert_eq!(variables["level"], "beginner");
                assert_eq!(variables["format"], "a=b");
                assert_eq!(prompt.target(), None);
            }
            other => panic!("Expected generate, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_with_target() {
        let args = Args::try_parse_from([
            "llm-gateway",
            "--config",
            "gateway.toml",
            "stream",
            "hi",
            "--provider",
            "local",
            "--model",
            "qwen",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("gateway.toml")));
        match args.command {
            Commands::Stream { prompt } => {
                assert_eq!(prompt.prompt, "general_assistant");
                assert_eq!(
                    prompt.target(),
                    Some(("local".to_string(), "qwen".to_string()))
                );
            }
            other => panic!("Expected stream, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_requires_model() {
        let result = Args::try_parse_from(["llm-gateway", "generate", "hi", "--provider", "local"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_command() {
        let args = Args::try_parse_from([
            "llm-gateway",
            "render",
            "--prompt",
            "essay",
            "--type",
            "user",
        ])
        .unwrap();

        match args.command {
            Commands::Render {
                prompt,
                language,
                prompt_type,
                vars,
            } => {
                assert_eq!(prompt, "essay");
                assert_eq!(language, "en");
                assert_eq!(prompt_type, PromptType::User);
                assert!(vars.is_empty());
            }
            other => panic!("Expected render, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_variable_is_rejected() {
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("=value").is_err());
        assert_eq!(
            parse_variable("topic=tides"),
            Ok(("topic".to_string(), "tides".to_string()))
        );
    }

    #[test]
    fn test_no_command_error() {
        assert!(Args::try_parse_from(["llm-gateway"]).is_err());
    }
}
