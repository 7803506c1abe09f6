//! Template records and the read side the resolver depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    System,
    User,
    Assistant,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::System => "system",
            PromptType::User => "user",
            PromptType::Assistant => "assistant",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(PromptType::System),
            "user" => Ok(PromptType::User),
            "assistant" => Ok(PromptType::Assistant),
            other => Err(format!("unknown prompt type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub language: String,
    pub prompt_type: PromptType,
    /// Text with `{variable}` placeholders
    pub template: String,
    #[serde(default)]
    pub description: String,
    /// Variable names the template documents; informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl PromptTemplate {
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        prompt_type: PromptType,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            prompt_type,
            template: template.into(),
            description: String::new(),
            variables: Vec::new(),
            is_default: false,
            is_active: true,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    fn same_slot(&self, other: &PromptTemplate) -> bool {
        self.language == other.language && self.prompt_type == other.prompt_type
    }

    fn same_key(&self, other: &PromptTemplate) -> bool {
        self.same_slot(other) && self.name == other.name
    }
}

/// Read access to template records. Inactive records are never returned by
/// the lookups.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_named(
        &self,
        name: &str,
        language: &str,
        prompt_type: PromptType,
    ) -> Option<PromptTemplate>;

    async fn find_default(&self, language: &str, prompt_type: PromptType) -> Option<PromptTemplate>;

    /// Active and inactive records, defaults first, then by language and name
    async fn list(
        &self,
        language: Option<&str>,
        prompt_type: Option<PromptType>,
    ) -> Vec<PromptTemplate>;
}

#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<Vec<PromptTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_templates(templates: impl IntoIterator<Item = PromptTemplate>) -> Self {
        let store = Self::new();
        for template in templates {
            store.upsert(template).await;
        }
        store
    }

    /// Insert or replace by `(name, language, type)`. A default demotes the
    /// previous default of its `(language, type)`.
    pub async fn upsert(&self, template: PromptTemplate) {
        let mut templates = self.templates.write().await;
        if template.is_default {
            for existing in templates.iter_mut().filter(|t| t.same_slot(&template)) {
                existing.is_default = false;
            }
        }
        match templates.iter_mut().find(|t| t.same_key(&template)) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
    }

    pub async fn remove(&self, name: &str, language: &str, prompt_type: PromptType) -> bool {
        let mut templates = self.templates.write().await;
        let before = templates.len();
        templates.retain(|t| {
            !(t.name == name && t.language == language && t.prompt_type == prompt_type)
        });
        templates.len() != before
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find_named(
        &self,
        name: &str,
        language: &str,
        prompt_type: PromptType,
    ) -> Option<PromptTemplate> {
        self.templates
            .read()
            .await
            .iter()
            .find(|t| {
                t.is_active
                    && t.name == name
                    && t.language == language
                    && t.prompt_type == prompt_type
            })
            .cloned()
    }

    async fn find_default(
        &self,
        language: &str,
        prompt_type: PromptType,
    ) -> Option<PromptTemplate> {
        self.templates
            .read()
            .await
            .iter()
            .find(|t| {
                t.is_active
                    && t.is_default
                    && t.language == language
                    && t.prompt_type == prompt_type
            })
            .cloned()
    }

    async fn list(
        &self,
        language: Option<&str>,
        prompt_type: Option<PromptType>,
    ) -> Vec<PromptTemplate> {
        let mut matching: Vec<PromptTemplate> = self
            .templates
            .read()
            .await
            .iter()
            .filter(|t| language.is_none_or(|language| t.language == language))
            .filter(|t| prompt_type.is_none_or(|prompt_type| t.prompt_type == prompt_type))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.language.cmp(&b.language))
                .then_with(|| a.name.cmp(&b.name))
        });
        matching
    }
}
