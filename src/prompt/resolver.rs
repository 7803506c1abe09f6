//! Template resolution with language fallback and lookup caching.
//!
//! Resolution order for `(name, language, type)`:
//! 1. the active template with that exact name
//! 2. the default template for `(language, type)`
//! 3. the English default for `type`, when `language` is not English
//!
//! Found templates are cached for an hour, misses for five minutes, so a
//! client asking for a missing template repeatedly reaches the store once
//! per negative window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GatewaySettings;
use crate::env::defaults::{FALLBACK_LANGUAGE, PROMPT_CACHE_TTL_SECS, PROMPT_NEGATIVE_TTL_SECS};
use crate::llm::cache::TtlCache;
use crate::llm::error::GatewayError;
use crate::prompt::render;
use crate::prompt::store::{PromptTemplate, PromptType, TemplateStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Named {
        name: String,
        language: String,
        prompt_type: PromptType,
    },
    Default {
        language: String,
        prompt_type: PromptType,
    },
}

pub struct PromptResolver {
    store: Arc<dyn TemplateStore>,
    cache: TtlCache<LookupKey, Option<Arc<PromptTemplate>>>,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl PromptResolver {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            cache: TtlCache::new(),
            positive_ttl: Duration::from_secs(PROMPT_CACHE_TTL_SECS),
            negative_ttl: Duration::from_secs(PROMPT_NEGATIVE_TTL_SECS),
        }
    }

    pub fn from_settings(store: Arc<dyn TemplateStore>, settings: &GatewaySettings) -> Self {
        Self::new(store).with_ttls(
            Duration::from_secs(settings.prompt_cache_ttl_secs),
            Duration::from_secs(settings.prompt_negative_ttl_secs),
        )
    }

    pub fn with_ttls(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_ttl = positive;
        self.negative_ttl = negative;
        self
    }

    pub async fn resolve(
        &self,
        name: &str,
        language: &str,
        prompt_type: PromptType,
    ) -> Result<Arc<PromptTemplate>, GatewayError> {
        if let Some(template) = self.named(name, language, prompt_type).await {
            return Ok(template);
        }

        if let Some(template) = self.default_for(language, prompt_type).await {
            debug!(
                "Prompt '{}' not found for {}, using default '{}'",
                name, language, template.name
            );
            return Ok(template);
        }

        if language != FALLBACK_LANGUAGE {
            if let Some(template) = self.default_for(FALLBACK_LANGUAGE, prompt_type).await {
                debug!(
                    "No {} prompt for '{}', falling back to {} default '{}'",
                    language, name, FALLBACK_LANGUAGE, template.name
                );
                return Ok(template);
            }
        }

        warn!(
            "No prompt template available for '{}' in {} ({})",
            name, language, prompt_type
        );
        Err(GatewayError::NoPromptAvailable {
            name: name.to_string(),
            language: language.to_string(),
            prompt_type: prompt_type.to_string(),
        })
    }

    /// Resolve and render in one step
    pub async fn render(
        &self,
        name: &str,
        language: &str,
        prompt_type: PromptType,
        variables: &HashMap<String, String>,
    ) -> Result<String, GatewayError> {
        let template = self.resolve(name, language, prompt_type).await?;
        render::render(&template, variables)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn named(
        &self,
        name: &str,
        language: &str,
        prompt_type: PromptType,
    ) -> Option<Arc<PromptTemplate>> {
        let key = LookupKey::Named {
            name: name.to_string(),
            language: language.to_string(),
            prompt_type,
        };
        self.cached_lookup(key, self.store.find_named(name, language, prompt_type))
            .await
    }

    async fn default_for(
        &self,
        language: &str,
        prompt_type: PromptType,
    ) -> Option<Arc<PromptTemplate>> {
        let key = LookupKey::Default {
            language: language.to_string(),
            prompt_type,
        };
        self.cached_lookup(key, self.store.find_default(language, prompt_type))
            .await
    }

    async fn cached_lookup(
        &self,
        key: LookupKey,
        lookup: impl Future<Output = Option<PromptTemplate>>,
    ) -> Option<Arc<PromptTemplate>> {
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let found = lookup.await.map(Arc::new);
        let ttl = if found.is_some() {
            self.positive_ttl
        } else {
            self.negative_ttl
        };
        self.cache.insert(key, found.clone(), ttl);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::error::ErrorCode;
    use crate::prompt::store::InMemoryTemplateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts store round-trips
    struct CountingStore {
        inner: InMemoryTemplateStore,
        lookups: AtomicU32,
    }

    impl CountingStore {
        async fn with(templates: Vec<PromptTemplate>) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryTemplateStore::from_templates(templates).await,
                lookups: AtomicU32::new(0),
            })
        }

        fn lookups(&self) -> u32 {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TemplateStore for CountingStore {
        async fn find_named(
            &self,
            name: &str,
            language: &str,
            prompt_type: PromptType,
        ) -> Option<PromptTemplate> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_named(name, language, prompt_type).await
        }

        async fn find_default(
            &self,
            language: &str,
            prompt_type: PromptType,
        ) -> Option<PromptTemplate> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_default(language, prompt_type).await
        }

        async fn list(
            &self,
            language: Option<&str>,
            prompt_type: Option<PromptType>,
        ) -> Vec<PromptTemplate> {
            self.inner.list(language, prompt_type).await
        }
    }

    fn template(name: &str, language: &str) -> PromptTemplate {
        PromptTemplate::new(name, language, PromptType::System, format!("{name}/{language}"))
    }

    #[tokio::test]
    async fn test_named_template_wins() {
        let store = CountingStore::with(vec![
            template("essay", "zh"),
            template("general", "zh").as_default(),
        ])
        .await;
        let resolver = PromptResolver::new(store);

        let resolved = resolver.resolve("essay", "zh", PromptType::System).await.unwrap();
        assert_eq!(resolved.template, "essay/zh");
    }

    #[tokio::test]
    async fn test_fallback_chain() {
        let store = CountingStore::with(vec![
            template("general", "zh").as_default(),
            template("general", "en").as_default(),
        ])
        .await;
        let resolver = PromptResolver::new(store);

        let same_language = resolver.resolve("essay", "zh", PromptType::System).await.unwrap();
        assert_eq!(same_language.template, "general/zh");

        let english = resolver.resolve("essay", "fr", PromptType::System).await.unwrap();
        assert_eq!(english.template, "general/en");

        let error = resolver
            .resolve("essay", "fr", PromptType::User)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::NoPromptAvailable);
    }

    #[tokio::test]
    async fn test_no_english_default_fails() {
        let store = CountingStore::with(vec![template("essay", "en")]).await;
        let resolver = PromptResolver::new(store);

        let error = resolver
            .resolve("other", "en", PromptType::System)
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::NoPromptAvailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookups_are_cached_positive_and_negative() {
        let store = CountingStore::with(vec![template("general", "en").as_default()]).await;
        let resolver = PromptResolver::new(store.clone());

        // named miss, en default hit
        resolver.resolve("missing", "en", PromptType::System).await.unwrap();
        assert_eq!(store.lookups(), 2);

        resolver.resolve("missing", "en", PromptType::System).await.unwrap();
        assert_eq!(store.lookups(), 2);

        // The miss expires after five minutes, the hit after an hour
        tokio::time::advance(Duration::from_secs(301)).await;
        resolver.resolve("missing", "en", PromptType::System).await.unwrap();
        assert_eq!(store.lookups(), 3);

        tokio::time::advance(Duration::from_secs(3600)).await;
        resolver.resolve("missing", "en", PromptType::System).await.unwrap();
        assert_eq!(store.lookups(), 5);
    }

    #[tokio::test]
    async fn test_render_through_resolver() {
        let store = CountingStore::with(vec![PromptTemplate::new(
            "essay",
            "en",
            PromptType::System,
            "Write about {topic}.",
        )])
        .await;
        let resolver = PromptResolver::new(store);

        let variables = HashMap::from([("topic".to_string(), "tides".to_string())]);
        let text = resolver
            .render("essay", "en", PromptType::System, &variables)
            .await
            .unwrap();
        assert_eq!(text, "Write about tides.");

        let error = resolver
            .render("essay", "en", PromptType::System, &HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::MissingVariable);
    }
}
