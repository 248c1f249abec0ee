//! # cheatstore
//!
//! An offline store of command-line cheat sheets. The page corpus is fetched
//! as an archive, parsed into examples with typed placeholders, cached on
//! disk with a TTL and served through name, platform and substring lookups.
//!
//! ## Example Usage
//!
//! ```no_run
//! use cheatstore::{ArchiveFetcher, Config, Platform, Store};
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Store::open(&config, Box::new(ArchiveFetcher::from_config(&config)))?;
//!     store.initialize()?;
//!
//!     for page in store.search_pages("tar", &[Platform::Common]) {
//!         println!("{}: {}", page.name, page.description);
//!     }
//!
//!     let page = store.find_page("tar")?;
//!     if let Some(example) = page.find_best_example("extract") {
//!         let vars = HashMap::from([("file".to_string(), "backup.tar".to_string())]);
//!         println!("{}", example.render(&vars));
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod nav;
pub mod plugin;
pub mod services;
pub mod types;

pub use config::{load_config, Config, ConfigWarning, LoadedConfig};
pub use error::{CheatstoreError, Result};
pub use nav::{NavEvent, NavState, Navigator};
pub use plugin::{Plugin, PluginRegistry};
pub use services::{
    ArchiveFetcher, ExecOutcome, Executor, InitOutcome, PageSource, Store, StoreStats,
    UpdateReport,
};
pub use types::{Example, IndexEntry, Page, Placeholder, PlaceholderKind, Platform};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
