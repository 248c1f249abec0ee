//! Configuration loading.
//!
//! The config file is a flat TOML document. Every key is optional; a key with
//! the wrong type or an out-of-range value falls back to its default and is
//! reported as a [`ConfigWarning`] instead of failing the load.
//!
//! | Key | Default |
//! |-----|---------|
//! | `theme` | `dark` |
//! | `platforms` | `["common", "linux"]` |
//! | `confirm_destructive` | `true` |
//! | `clipboard` | `true` |
//! | `pager` | `less -R` |
//! | `cache_dir` | `<user cache dir>/cheatstore/pages` |
//! | `cache_ttl_hours` | `72` |
//! | `archive_source` | the upstream release zip |
//! | `timeout_secs` | `30` |
//! | `audit_log` | `<user cache dir>/cheatstore/exec.log` |
//! | `[keymap]` | `run = "ctrl+enter"`, `copy = "y"`, `paste = "p"` |

use crate::error::{CheatstoreError, Result};
use crate::types::Platform;
use directories::ProjectDirs;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Value;
use tracing::warn;
use url::Url;

pub const DEFAULT_ARCHIVE_SOURCE: &str =
    "https://github.com/tldr-pages/tldr/releases/latest/download/tldr.zip";
pub const DEFAULT_TTL_HOURS: u64 = 72;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const CONFIG_ENV_VAR: &str = "CHEATSTORE_CONFIG";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Keymap {
    pub run: String,
    pub copy: String,
    pub paste: String,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            run: "ctrl+enter".to_string(),
            copy: "y".to_string(),
            paste: "p".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Config {
    pub theme: String,
    pub platforms: Vec<Platform>,
    pub confirm_destructive: bool,
    pub clipboard: bool,
    pub pager: String,
    pub cache_dir: PathBuf,
    pub cache_ttl_hours: u64,
    pub archive_source: String,
    pub timeout_secs: u64,
    pub audit_log: PathBuf,
    pub keymap: Keymap,
}

impl Default for Config {
    fn default() -> Self {
        let base = default_cache_base();
        Self {
            theme: "dark".to_string(),
            platforms: vec![Platform::Common, Platform::Linux],
            confirm_destructive: true,
            clipboard: true,
            pager: "less -R".to_string(),
            cache_dir: base.join("pages"),
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            archive_source: DEFAULT_ARCHIVE_SOURCE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            audit_log: base.join("exec.log"),
            keymap: Keymap::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CheatstoreError::Config {
            reason: format!("failed to serialize config: {}", e),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// A key that was present but unusable; the default was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Config file location: `CHEATSTORE_CONFIG` > user config dir > `./.config/cheatstore`.
pub fn default_config_path() -> PathBuf {
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    match ProjectDirs::from("", "", "cheatstore") {
        Some(dirs) => dirs.config_dir().join(CONFIG_FILENAME),
        None => Path::new(".config").join("cheatstore").join(CONFIG_FILENAME),
    }
}

fn default_cache_base() -> PathBuf {
    match ProjectDirs::from("", "", "cheatstore") {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => Path::new(".cache").join("cheatstore"),
    }
}

/// Load a config file. A missing file yields defaults; a malformed file or
/// value yields defaults plus warnings. Only an unreadable file is an error.
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    if !path.exists() {
        return Ok(LoadedConfig {
            config: Config::default(),
            warnings: Vec::new(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| CheatstoreError::Config {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    let loaded = parse_config(&content);
    for warning in &loaded.warnings {
        warn!(
            "config {}: ignoring '{}': {}",
            path.display(),
            warning.key,
            warning.reason
        );
    }
    Ok(loaded)
}

pub fn parse_config(content: &str) -> LoadedConfig {
    let mut config = Config::default();
    let mut warnings = Vec::new();

    let table = match toml::from_str::<Value>(content) {
        Ok(Value::Table(table)) => table,
        Ok(_) => {
            warnings.push(ConfigWarning {
                key: "<root>".to_string(),
                reason: "top-level TOML must be a table".to_string(),
            });
            return LoadedConfig { config, warnings };
        }
        Err(e) => {
            warnings.push(ConfigWarning {
                key: "<root>".to_string(),
                reason: format!("failed to parse: {}", e),
            });
            return LoadedConfig { config, warnings };
        }
    };

    let mut reader = FieldReader {
        table: &table,
        warnings: &mut warnings,
    };

    if let Some(theme) = reader.string("theme") {
        config.theme = theme;
    }
    if let Some(platforms) = reader.platforms("platforms") {
        config.platforms = platforms;
    }
    if let Some(flag) = reader.boolean("confirm_destructive") {
        config.confirm_destructive = flag;
    }
    if let Some(flag) = reader.boolean("clipboard") {
        config.clipboard = flag;
    }
    if let Some(pager) = reader.string("pager") {
        config.pager = pager;
    }
    if let Some(dir) = reader.string("cache_dir") {
        config.cache_dir = PathBuf::from(dir);
    }
    if let Some(hours) = reader.unsigned("cache_ttl_hours") {
        config.cache_ttl_hours = hours;
    }
    if let Some(source) = reader.archive_source("archive_source") {
        config.archive_source = source;
    }
    if let Some(secs) = reader.unsigned("timeout_secs") {
        if secs == 0 {
            reader.warn("timeout_secs", "must be greater than zero");
        } else {
            config.timeout_secs = secs;
        }
    }
    if let Some(log) = reader.string("audit_log") {
        config.audit_log = PathBuf::from(log);
    }
    match table.get("keymap") {
        None => {}
        Some(Value::Table(keys)) => {
            let mut keymap_reader = FieldReader {
                table: keys,
                warnings: &mut warnings,
            };
            if let Some(run) = keymap_reader.string("run") {
                config.keymap.run = run;
            }
            if let Some(copy) = keymap_reader.string("copy") {
                config.keymap.copy = copy;
            }
            if let Some(paste) = keymap_reader.string("paste") {
                config.keymap.paste = paste;
            }
        }
        Some(_) => warnings.push(ConfigWarning {
            key: "keymap".to_string(),
            reason: "expected a table".to_string(),
        }),
    }

    LoadedConfig { config, warnings }
}

struct FieldReader<'a> {
    table: &'a toml::map::Map<String, Value>,
    warnings: &'a mut Vec<ConfigWarning>,
}

impl FieldReader<'_> {
    fn warn(&mut self, key: &str, reason: &str) {
        self.warnings.push(ConfigWarning {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }

    fn string(&mut self, key: &str) -> Option<String> {
        match self.table.get(key)? {
            Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Value::String(_) => {
                self.warn(key, "must not be empty");
                None
            }
            _ => {
                self.warn(key, "expected a string");
                None
            }
        }
    }

    fn boolean(&mut self, key: &str) -> Option<bool> {
        match self.table.get(key)? {
            Value::Boolean(value) => Some(*value),
            _ => {
                self.warn(key, "expected true or false");
                None
            }
        }
    }

    fn unsigned(&mut self, key: &str) -> Option<u64> {
        match self.table.get(key)? {
            Value::Integer(value) if *value >= 0 => Some(*value as u64),
            Value::Integer(_) => {
                self.warn(key, "must not be negative");
                None
            }
            _ => {
                self.warn(key, "expected an integer");
                None
            }
        }
    }

    fn platforms(&mut self, key: &str) -> Option<Vec<Platform>> {
        let Value::Array(items) = self.table.get(key)? else {
            self.warn(key, "expected a list of platform names");
            return None;
        };
        let mut platforms = Vec::new();
        for item in items {
            match item.as_str().and_then(Platform::parse) {
                Some(platform) if !platforms.contains(&platform) => platforms.push(platform),
                Some(_) => {}
                None => self.warn(key, &format!("unknown platform {}", item)),
            }
        }
        if platforms.is_empty() && !items.is_empty() {
            self.warn(key, "no known platforms listed");
            return None;
        }
        Some(platforms)
    }

    fn archive_source(&mut self, key: &str) -> Option<String> {
        let value = self.string(key)?;
        if value.starts_with("http://") || value.starts_with("https://") {
            if let Err(e) = Url::parse(&value) {
                self.warn(key, &format!("invalid URL: {}", e));
                return None;
            }
        }
        Some(value)
    }
}
