pub mod exec;
pub mod fetcher;
pub mod parser;
pub mod renderer;
pub mod search;
pub mod store;

pub use exec::{ExecOutcome, Executor};
pub use fetcher::{ArchiveFetcher, PageSource};
pub use parser::PageParser;
pub use store::{Catalog, InitOutcome, Store, StoreStats, UpdateReport};
