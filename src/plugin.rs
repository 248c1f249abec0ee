//! Named capabilities that can be invoked on an example.
//!
//! The registry is built once at startup; front ends look plugins up by name
//! instead of hard-wiring them.

use crate::error::{CheatstoreError, Result};
use crate::types::Example;
use std::collections::BTreeMap;
use tracing::debug;

const MAX_DESCRIPTION_LEN: usize = 80;
const MAX_COMMAND_LEN: usize = 100;
const MAX_PLACEHOLDER_LEN: usize = 20;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Run against one example and return human-readable findings.
    fn execute(&self, example: &Example) -> Result<Vec<String>>;
}

/// Checks an example against the upstream page style guide.
pub struct LintPlugin;

impl Plugin for LintPlugin {
    fn name(&self) -> &str {
        "lint"
    }

    fn description(&self) -> &str {
        "Check an example against the page style guide"
    }

    fn execute(&self, example: &Example) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        let description_len = example.description.chars().count();
        if description_len > MAX_DESCRIPTION_LEN {
            issues.push(format!(
                "description is {} characters (max {})",
                description_len, MAX_DESCRIPTION_LEN
            ));
        }

        let command_len = example.command.chars().count();
        if command_len > MAX_COMMAND_LEN {
            issues.push(format!(
                "command is {} characters (max {})",
                command_len, MAX_COMMAND_LEN
            ));
        }

        if example.command.split_whitespace().any(|word| word == "sudo") {
            issues.push("command uses sudo".to_string());
        }
        if example.command.contains("&&") {
            issues.push("command chains with &&; split it into separate examples".to_string());
        }

        for placeholder in &example.placeholders {
            let name = placeholder.name.trim();
            if name.is_empty() {
                issues.push("placeholder has an empty name".to_string());
            } else if name.chars().count() > MAX_PLACEHOLDER_LEN {
                issues.push(format!(
                    "placeholder '{}' is longer than {} characters",
                    name, MAX_PLACEHOLDER_LEN
                ));
            }
        }

        Ok(issues)
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LintPlugin));
        registry
    }

    /// Adds a plugin, replacing any previous one with the same name.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|plugin| plugin.as_ref())
    }

    /// Sorted by name.
    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.values().map(|plugin| plugin.as_ref())
    }

    pub fn run(&self, name: &str, example: &Example) -> Result<Vec<String>> {
        let plugin = self.get(name).ok_or_else(|| CheatstoreError::Plugin {
            name: name.to_string(),
            reason: "no such plugin".to_string(),
        })?;
        plugin.execute(example)
    }
}
