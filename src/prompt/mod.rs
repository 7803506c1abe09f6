//! Prompt templates: storage contract, resolution, rendering and language
//! detection.

pub mod language;
pub mod render;
pub mod resolver;
pub mod store;

pub use language::{DetectionReport, detect, detect_with_confidence};
pub use render::{placeholders, render, render_text};
pub use resolver::PromptResolver;
pub use store::{InMemoryTemplateStore, PromptTemplate, PromptType, TemplateStore};
