use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Common,
    Linux,
    Osx,
    Sunos,
    Windows,
    Android,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Common,
        Platform::Linux,
        Platform::Osx,
        Platform::Sunos,
        Platform::Windows,
        Platform::Android,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::Sunos => "sunos",
            Self::Windows => "windows",
            Self::Android => "android",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog row. The description stays empty until the page has been parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub description: String,
    pub platform: Platform,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            platform,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    File,
    Directory,
    Port,
    Number,
    Url,
    Ip,
    Username,
    Password,
    Email,
    Text,
}

impl PlaceholderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Port => "port",
            Self::Number => "number",
            Self::Url => "url",
            Self::Ip => "ip",
            Self::Username => "username",
            Self::Password => "password",
            Self::Email => "email",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: PlaceholderKind,
    pub description: Option<String>,
    pub default: Option<String>,
}

impl Placeholder {
    /// The literal token as it appears in a command template.
    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Example {
    pub description: String,
    pub command: String,
    pub placeholders: Vec<Placeholder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub name: String,
    pub description: String,
    pub platform: Platform,
    pub examples: Vec<Example>,
    pub raw: String,
}

impl Page {
    pub fn entry(&self) -> IndexEntry {
        IndexEntry {
            name: self.name.clone(),
            description: self.description.clone(),
            platform: self.platform,
        }
    }
}
