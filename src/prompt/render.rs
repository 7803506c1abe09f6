//! Placeholder substitution for prompt templates.
//!
//! `{name}` is replaced by the variable `name`, where `name` is a run of
//! letters, digits, `_` and `-` starting with a letter or `_` in any script.
//! `{{` and `}}` produce literal braces. Any other brace, such as the ones in
//! an embedded JSON example, is copied through untouched.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::llm::error::GatewayError;
use crate::prompt::store::PromptTemplate;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([\p{L}_][\p{L}\p{N}_\-]*)\}").expect("valid placeholder pattern")
});

/// Render `template` with `variables`, failing on the first placeholder
/// without a value.
pub fn render(
    template: &PromptTemplate,
    variables: &HashMap<String, String>,
) -> Result<String, GatewayError> {
    render_text(&template.name, &template.template, variables)
}

pub fn render_text(
    template_name: &str,
    text: &str,
    variables: &HashMap<String, String>,
) -> Result<String, GatewayError> {
    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        rendered.push_str(&text[last..whole.start()]);
        rendered.push_str(substitution(template_name, &captures, variables)?);
        last = whole.end();
    }
    rendered.push_str(&text[last..]);

    Ok(rendered)
}

fn substitution<'a>(
    template_name: &str,
    captures: &Captures<'a>,
    variables: &'a HashMap<String, String>,
) -> Result<&'a str, GatewayError> {
    match captures.get(1) {
        Some(name) => variables
            .get(name.as_str())
            .map(String::as_str)
            .ok_or_else(|| GatewayError::MissingVariable {
                template: template_name.to_string(),
                variable: name.as_str().to_string(),
            }),
        None if &captures[0] == "{{" => Ok("{"),
        None => Ok("}"),
    }
}

/// Placeholder names referenced by `text`, in first-use order
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in PLACEHOLDER.captures_iter(text) {
        if let Some(name) = captures.get(1) {
            if !names.iter().any(|existing| existing == name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::error::ErrorCode;
    use crate::prompt::store::PromptType;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_every_occurrence() {
        let rendered = render_text(
            "t",
            "Write about {topic}. Keep {topic} under {limit} words.",
            &vars(&[("topic", "rust"), ("limit", "100")]),
        )
        .unwrap();
        assert_eq!(rendered, "Write about rust. Keep rust under 100 words.");
    }

    #[test]
    fn test_missing_variable_names_the_key() {
        let template = PromptTemplate::new("essay", "en", PromptType::System, "About {topic}");
        let error = render(&template, &HashMap::new()).unwrap_err();

        assert_eq!(error.code(), ErrorCode::MissingVariable);
        match error {
            GatewayError::MissingVariable { template, variable } => {
                assert_eq!(template, "essay");
                assert_eq!(variable, "topic");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let variables = vars(&[("name", "Ada")]);
        let first = render_text("t", "Hello {name}!", &variables).unwrap();
        let second = render_text("t", "Hello {name}!", &variables).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_literal_braces() {
        let text = r#"Reply as JSON: {{"title": "{title}"}} or { "raw": 1 }"#;
        let rendered = render_text("t", text, &vars(&[("title", "Intro")])).unwrap();
        assert_eq!(rendered, r#"Reply as JSON: {"title": "Intro"} or { "raw": 1 }"#);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let rendered = render_text("t", "{a}", &vars(&[("a", "{b}")])).unwrap();
        assert_eq!(rendered, "{b}");
    }

    #[test]
    fn test_non_ascii_variable_names() {
        let variables = vars(&[("主题", "潮汐")]);
        let rendered = render_text("t", "请写关于{主题}的文章", &variables).unwrap();
        assert_eq!(rendered, "请写关于潮汐的文章");

        let variables = vars(&[("first-name", "Ada"), ("年龄2", "36")]);
        let rendered = render_text("t", "Hi {first-name}, {年龄2}", &variables).unwrap();
        assert_eq!(rendered, "Hi Ada, 36");
    }

    #[test]
    fn test_missing_hyphenated_variable() {
        let error = render_text("t", "Write about {topic-name}", &HashMap::new()).unwrap_err();
        match error {
            GatewayError::MissingVariable { variable, .. } => assert_eq!(variable, "topic-name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_examples_stay_literal() {
        let text = r#"Example: {"raw": 1} and { "nested": {"a": [1]} } and {-1}"#;
        assert_eq!(render_text("t", text, &HashMap::new()).unwrap(), text);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{topic} {{escaped}} {level} {topic} {主题}"),
            vec!["topic".to_string(), "level".to_string(), "主题".to_string()]
        );
    }
}
