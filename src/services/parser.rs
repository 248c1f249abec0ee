use crate::types::{Example, IndexEntry, Page, Placeholder, PlaceholderKind};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Ordered substring rules for placeholder kinds. First match wins, so
/// `zipfile` is a file, not an ip.
const KIND_RULES: &[(&[&str], PlaceholderKind)] = &[
    (&["file", "path"], PlaceholderKind::File),
    (&["dir", "directory"], PlaceholderKind::Directory),
    (&["port"], PlaceholderKind::Port),
    (&["num", "number", "count"], PlaceholderKind::Number),
    (&["url", "link"], PlaceholderKind::Url),
    (&["ip", "address"], PlaceholderKind::Ip),
    (&["user", "username"], PlaceholderKind::Username),
    (&["pass", "password"], PlaceholderKind::Password),
    (&["email"], PlaceholderKind::Email),
];

pub struct PageParser {
    placeholder_pattern: Regex,
}

enum Line<'a> {
    Heading,
    Quote(&'a str),
    ListItem(&'a str),
    Code(&'a str),
    Blank,
    Other,
}

impl PageParser {
    pub fn new() -> Self {
        Self {
            placeholder_pattern: Regex::new(r"\{\{([^}]+)\}\}").expect("valid placeholder pattern"),
        }
    }

    /// Build a page from raw markdown. Never fails: lines outside the grammar
    /// are skipped and whatever structure was recognized is kept.
    pub fn parse_page(&self, raw: &str, entry: &IndexEntry) -> Page {
        let mut page = Page {
            name: entry.name.clone(),
            description: entry.description.clone(),
            platform: entry.platform,
            examples: Vec::new(),
            raw: raw.to_string(),
        };

        let mut open: Option<Example> = None;

        for line in raw.lines() {
            match classify(line.trim()) {
                Line::Heading | Line::Other => {}
                Line::Quote(text) => page.description = text.to_string(),
                Line::ListItem(text) => {
                    if let Some(example) = open.take() {
                        page.examples.push(example);
                    }
                    open = Some(Example {
                        description: text.to_string(),
                        ..Example::default()
                    });
                }
                Line::Code(command) => {
                    if let Some(example) = open.as_mut() {
                        example.command = command.to_string();
                        example.placeholders = self.extract_placeholders(command);
                    }
                }
                Line::Blank => {
                    // A blank directly under the list item separates it from its command.
                    if open.as_ref().is_some_and(|example| !example.command.is_empty()) {
                        if let Some(example) = open.take() {
                            page.examples.push(example);
                        }
                    }
                }
            }
        }

        if let Some(example) = open.take() {
            page.examples.push(example);
        }

        debug!(
            "Parsed page {}/{} with {} examples",
            page.platform,
            page.name,
            page.examples.len()
        );
        page
    }

    /// Distinct `{{name}}` tokens in command order.
    pub fn extract_placeholders(&self, command: &str) -> Vec<Placeholder> {
        let mut seen = HashSet::new();
        let mut placeholders = Vec::new();

        for captures in self.placeholder_pattern.captures_iter(command) {
            let name = &captures[1];
            if seen.insert(name.to_string()) {
                placeholders.push(Placeholder {
                    name: name.to_string(),
                    kind: infer_kind(name),
                    description: None,
                    default: None,
                });
            }
        }

        placeholders
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with("# ") {
        return Line::Heading;
    }
    if let Some(text) = line.strip_prefix("> ") {
        return Line::Quote(text.trim());
    }
    if let Some(text) = line.strip_prefix("- ") {
        return Line::ListItem(text.trim());
    }
    if line.len() >= 2 {
        if let Some(command) = line.strip_prefix('`').and_then(|rest| rest.strip_suffix('`')) {
            return Line::Code(command);
        }
    }
    Line::Other
}

pub fn infer_kind(name: &str) -> PlaceholderKind {
    let lowered = name.to_lowercase();
    KIND_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(_, kind)| *kind)
        .unwrap_or(PlaceholderKind::Text)
}

fn shared_parser() -> &'static PageParser {
    static PARSER: OnceLock<PageParser> = OnceLock::new();
    PARSER.get_or_init(PageParser::new)
}

pub fn parse_page(raw: &str, entry: &IndexEntry) -> Page {
    shared_parser().parse_page(raw, entry)
}

pub fn extract_placeholders(command: &str) -> Vec<Placeholder> {
    shared_parser().extract_placeholders(command)
}
