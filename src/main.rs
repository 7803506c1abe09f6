use anyhow::{Context, Result};
use futures::StreamExt;
use llm_gateway::cli::{Args, Commands, ConfigDiscovery, PromptArgs};
use llm_gateway::llm::extract;
use llm_gateway::llm::types::{GenerationOptions, Variables};
use llm_gateway::prompt::{self, InMemoryTemplateStore, PromptResolver, TemplateStore};
use llm_gateway::{GatewayConfig, GenerationService, PromptRequest, env};
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("llm_gateway=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(env::DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match args.command {
        Commands::Generate { prompt, html } => {
            let config = ConfigDiscovery::load(args.config.as_deref())?;
            run_generate(&config, &prompt, html).await
        }
        Commands::Stream { prompt } => {
            let config = ConfigDiscovery::load(args.config.as_deref())?;
            run_stream(&config, &prompt).await
        }
        Commands::DetectLanguage { text, json } => {
            let report = prompt::detect_with_confidence(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} (confidence {:.2})", report.language, report.confidence);
            }
            Ok(())
        }
        Commands::Render {
            prompt,
            language,
            prompt_type,
            vars,
        } => {
            let config = ConfigDiscovery::load(args.config.as_deref())?;
            let store = InMemoryTemplateStore::from_templates(config.templates).await;
            let resolver = PromptResolver::new(Arc::new(store));
            let variables: Variables = vars.into_iter().collect();
            let rendered = resolver
                .render(&prompt, &language, prompt_type, &variables)
                .await?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Templates {
            language,
            prompt_type,
        } => {
            let config = ConfigDiscovery::load(args.config.as_deref())?;
            let store = InMemoryTemplateStore::from_templates(config.templates).await;
            for template in store.list(language.as_deref(), prompt_type).await {
                println!(
                    "{}{} [{}/{}]{} vars: {}",
                    template.name,
                    if template.is_default { " (default)" } else { "" },
                    template.language,
                    template.prompt_type,
                    if template.is_active { "" } else { " inactive" },
                    prompt::placeholders(&template.template).join(", ")
                );
            }
            Ok(())
        }
        Commands::ShowConfig { init } => {
            if init {
                let path = ConfigDiscovery::create_default_user_config()?;
                println!("Default configuration at {:?}", path);
            }
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
    }
}

fn prompt_request(args: &PromptArgs) -> PromptRequest {
    let mut request = PromptRequest::new(&args.prompt, &args.input)
        .with_variables(args.variables())
        .with_options(GenerationOptions {
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            stream: None,
        });
    if let Some(language) = &args.language {
        request = request.with_language(language);
    }
    if let Some((provider, model)) = args.target() {
        request = request.with_target(provider, model);
    }
    request
}

/// Token cancelled on Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling generation");
            trigger.cancel();
        }
    });
    token
}

async fn run_generate(config: &GatewayConfig, args: &PromptArgs, html: bool) -> Result<()> {
    let service = GenerationService::from_config(config).await;
    let request = prompt_request(args);
    let cancel = ctrl_c_token();

    let text = service
        .generate_with_prompt(&request, &cancel)
        .await
        .with_context(|| format!("Generation with prompt '{}' failed", args.prompt))?;

    if html {
        println!("{}", extract::extract_html(&text));
    } else {
        println!("{text}");
    }
    Ok(())
}

async fn run_stream(config: &GatewayConfig, args: &PromptArgs) -> Result<()> {
    let service = GenerationService::from_config(config).await;
    let request = prompt_request(args);
    let cancel = ctrl_c_token();

    let mut fragments = service
        .stream_with_prompt(&request, cancel)
        .await
        .with_context(|| format!("Streaming with prompt '{}' failed", args.prompt))?;

    let mut stdout = io::stdout();
    let mut received = 0usize;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.context("Stream interrupted")?;
        received += fragment.len();
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    info!("Stream finished after {} bytes", received);
    Ok(())
}
