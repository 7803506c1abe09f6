use llm_gateway::cli::ConfigDiscovery;
use llm_gateway::llm::types::StreamMode;
use llm_gateway::prompt::{InMemoryTemplateStore, PromptResolver, TemplateStore};
use llm_gateway::{
    GatewayConfig, ModelConfig, PromptTemplate, PromptType, ProviderConfig, ProviderKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn sample_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.settings.default_provider = Some("local".to_string());
    config.settings.cache_ttl_secs = 120;
    config.providers.push(
        ProviderConfig::new("local", ProviderKind::Ollama, "http://localhost:11434")
            .with_max_retries(2),
    );
    config.providers.push(
        ProviderConfig::new("openai", ProviderKind::OpenAI, "https://api.openai.com")
            .with_api_key("sk-secret"),
    );
    config.models.push(
        ModelConfig::new("r1", "local", "deepseek-r1:7b").with_stream_mode(StreamMode::Collect),
    );
    config.templates.push(
        PromptTemplate::new("general", "en", PromptType::System, "Help with {topic}.").as_default(),
    );
    config.templates.push(PromptTemplate::new(
        "general",
        "zh",
        PromptType::System,
        "帮助解决{topic}。",
    ));
    config
}

#[test]
fn test_config_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("llm-gateway.toml");

    let original = sample_config();
    original.to_toml_file(&config_path).unwrap();
    assert!(config_path.exists());

    let loaded = ConfigDiscovery::load(Some(&config_path)).unwrap();
    assert_eq!(loaded.settings, original.settings);
    assert_eq!(loaded.providers.len(), 2);
    assert_eq!(loaded.providers[0].max_attempts(), 2);
    assert_eq!(loaded.providers[1].api_key.as_deref(), Some("sk-secret"));
    assert_eq!(loaded.models[0].stream_mode, StreamMode::Collect);
    assert_eq!(loaded.templates, original.templates);
    assert_eq!(
        loaded.default_target(),
        Some(("local".to_string(), "r1".to_string()))
    );
}

#[test]
fn test_invalid_toml_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.toml");
    std::fs::write(&config_path, "[[providers]]\nid = 3\n").unwrap();

    let error = GatewayConfig::from_toml_file(&config_path).unwrap_err();
    assert!(error.to_string().contains("Failed to parse TOML configuration"));
}

#[tokio::test]
async fn test_templates_from_config_resolve() {
    let config = sample_config();
    let store = Arc::new(InMemoryTemplateStore::from_templates(config.templates.clone()).await);
    assert_eq!(store.list(None, Some(PromptType::System)).await.len(), 2);

    let resolver = PromptResolver::from_settings(store, &config.settings);
    let variables = HashMap::from([("topic".to_string(), "lifetimes".to_string())]);

    let chinese = resolver
        .render("general", "zh", PromptType::System, &variables)
        .await
        .unwrap();
    assert_eq!(chinese, "帮助解决lifetimes。");

    let fallback = resolver
        .render("unknown", "de", PromptType::System, &variables)
        .await
        .unwrap();
    assert_eq!(fallback, "Help with lifetimes.");
}
