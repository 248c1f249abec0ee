use crate::types::{Example, Placeholder};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid placeholder pattern"))
}

/// Value for one placeholder: supplied variable, then default, then its name.
fn resolve<'a>(placeholder: &'a Placeholder, variables: &'a HashMap<String, String>) -> &'a str {
    variables
        .get(&placeholder.name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .or_else(|| placeholder.default.as_deref().filter(|value| !value.is_empty()))
        .unwrap_or(placeholder.name.as_str())
}

/// Fill every placeholder token in the example's command. Substitution is a
/// single pass, so braces inside a supplied value are left alone.
pub fn render(example: &Example, variables: &HashMap<String, String>) -> String {
    let values: HashMap<&str, &str> = example
        .placeholders
        .iter()
        .map(|placeholder| (placeholder.name.as_str(), resolve(placeholder, variables)))
        .collect();

    token_pattern()
        .replace_all(&example.command, |captures: &Captures| {
            let name = &captures[1];
            match values.get(name) {
                Some(value) => (*value).to_string(),
                None => name.to_string(),
            }
        })
        .into_owned()
}

/// Placeholders that would render as their own name.
pub fn unresolved<'a>(example: &'a Example, variables: &HashMap<String, String>) -> Vec<&'a Placeholder> {
    example
        .placeholders
        .iter()
        .filter(|placeholder| {
            let supplied = variables
                .get(&placeholder.name)
                .is_some_and(|value| !value.is_empty());
            let defaulted = placeholder
                .default
                .as_deref()
                .is_some_and(|value| !value.is_empty());
            !supplied && !defaulted
        })
        .collect()
}

impl Example {
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        render(self, variables)
    }
}
