//! On-disk page cache.
//!
//! Layout under the cache root:
//!
//! ```text
//! catalog.json                      committed catalog (timestamp, generation, entries)
//! pages-<generation>/<platform>/*.md  documents of the committed generation
//! .staging-<generation>/            transient fetch target
//! .update.lock                      held by the one process currently updating
//! ```
//!
//! An update claims `.update.lock`, fetches into a fresh staging directory,
//! parses everything, renames the staging directory into place and only then
//! replaces `catalog.json` (write-to-temp plus rename). In memory, readers
//! clone an `Arc<Catalog>` and never observe a half-applied update.

use crate::config::Config;
use crate::error::{CheatstoreError, Result};
use crate::services::fetcher::{document_path, PageSource};
use crate::services::parser::PageParser;
use crate::services::search;
use crate::types::{IndexEntry, Page, Platform};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use tracing::{debug, info, warn};

const CATALOG_FILENAME: &str = "catalog.json";
const CATALOG_VERSION: u32 = 1;
const GENERATION_PREFIX: &str = "pages-";
const STAGING_PREFIX: &str = ".staging-";
const LOCK_FILENAME: &str = ".update.lock";
/// A lock older than this belongs to a writer that died mid-update.
const ABANDONED_LOCK_MINUTES: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    updated_at: DateTime<Utc>,
    generation: String,
    entries: Vec<IndexEntry>,
}

/// Immutable snapshot of one committed generation.
#[derive(Debug, Default)]
pub struct Catalog {
    updated_at: Option<DateTime<Utc>>,
    generation: Option<String>,
    pages: Vec<Arc<Page>>,
}

impl Catalog {
    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub generation: String,
    pub pages: usize,
    pub skipped: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum InitOutcome {
    AlreadyFresh,
    Committed(UpdateReport),
    /// The refresh failed but a stale catalog is still being served.
    KeptStale(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub cache_dir: String,
    pub pages: usize,
    pub by_platform: BTreeMap<String, usize>,
    pub updated_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub disk_bytes: u64,
}

pub struct Store {
    root: PathBuf,
    ttl_hours: u64,
    preferred: Vec<Platform>,
    source: Box<dyn PageSource>,
    parser: PageParser,
    current: RwLock<Arc<Catalog>>,
    writer: Mutex<()>,
}

impl Store {
    /// Open the cache described by `config`, loading any committed catalog.
    /// Never touches the network.
    pub fn open(config: &Config, source: Box<dyn PageSource>) -> Result<Self> {
        let parser = PageParser::new();
        let catalog = load_committed(&config.cache_dir, &parser)?;
        if let Some(updated_at) = catalog.updated_at {
            info!(
                "Loaded {} cached pages from {} (updated {})",
                catalog.len(),
                config.cache_dir.display(),
                updated_at.to_rfc3339()
            );
        }

        Ok(Self {
            root: config.cache_dir.clone(),
            ttl_hours: config.cache_ttl_hours,
            preferred: config.platforms.clone(),
            source,
            parser,
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.root
    }

    /// The committed catalog as of now. Later updates do not affect it.
    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn is_initialized(&self) -> bool {
        !self.snapshot().is_empty()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshot().updated_at
    }

    /// True when there is no catalog or it is older than the TTL.
    pub fn is_stale(&self) -> bool {
        let Some(updated_at) = self.last_updated() else {
            return true;
        };
        let ttl = i64::try_from(self.ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::MAX);
        Utc::now().signed_duration_since(updated_at) >= ttl
    }

    /// Fetch only when there is no usable fresh catalog. A failed refresh of
    /// a stale catalog keeps serving it; a failed first fetch is fatal.
    pub fn initialize(&self) -> Result<InitOutcome> {
        if self.is_initialized() && !self.is_stale() {
            debug!("Catalog is fresh, nothing to initialize");
            return Ok(InitOutcome::AlreadyFresh);
        }

        match self.update() {
            Ok(report) => Ok(InitOutcome::Committed(report)),
            Err(CheatstoreError::UpdateConflict) => Err(CheatstoreError::UpdateConflict),
            Err(e) if self.is_initialized() => {
                warn!("Refresh failed, serving stale catalog: {}", e);
                Ok(InitOutcome::KeptStale(e.to_string()))
            }
            Err(e) => Err(CheatstoreError::ColdCache {
                source: Box::new(e),
            }),
        }
    }

    /// Like `initialize`, but a fresh catalog is reported as an error.
    pub fn initialize_strict(&self) -> Result<UpdateReport> {
        match self.initialize()? {
            InitOutcome::Committed(report) => Ok(report),
            InitOutcome::AlreadyFresh => Err(CheatstoreError::AlreadyInitialized),
            InitOutcome::KeptStale(reason) => Err(CheatstoreError::at_stage(
                "fetch",
                CheatstoreError::Fetch {
                    source_desc: self.source.describe(),
                    reason,
                    cause: None,
                },
            )),
        }
    }

    /// Unconditional refresh. All-or-nothing: on failure the previously
    /// committed catalog stays in place. Fails with `UpdateConflict` while
    /// another update runs, in this process or any other sharing the cache.
    pub fn update(&self) -> Result<UpdateReport> {
        let _guard = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(CheatstoreError::UpdateConflict),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        fs::create_dir_all(&self.root).map_err(|e| CheatstoreError::at_stage("fetch", e.into()))?;
        let _lock = UpdateLock::acquire(&self.root)?;

        info!("Updating page cache from {}", self.source.describe());
        let generation = new_generation(&self.root);
        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, generation));
        let target = self.root.join(format!("{}{}", GENERATION_PREFIX, generation));

        let result = self.stage_and_commit(&generation, &staging, &target);
        if result.is_err() {
            remove_dir_quietly(&staging);
            remove_dir_quietly(&target);
        }
        let report = result?;

        self.prune_generations(&generation);
        info!(
            "Committed generation {} with {} pages ({} skipped)",
            report.generation, report.pages, report.skipped
        );
        Ok(report)
    }

    /// Explicit refresh action: update only when the catalog is stale.
    pub fn refresh_if_stale(&self) -> Result<Option<UpdateReport>> {
        if self.is_stale() {
            self.update().map(Some)
        } else {
            Ok(None)
        }
    }

    fn stage_and_commit(&self, generation: &str, staging: &Path, target: &Path) -> Result<UpdateReport> {
        let corpus = self
            .source
            .fetch(staging)
            .map_err(|e| CheatstoreError::at_stage("fetch", e))?;

        let mut pages = Vec::with_capacity(corpus.documents.len());
        let mut skipped = 0;
        for document in &corpus.documents {
            match fs::read_to_string(&document.path) {
                Ok(raw) => pages.push(Arc::new(self.parser.parse_page(&raw, &document.entry))),
                Err(e) => {
                    warn!("Skipping unreadable page {}: {}", document.path.display(), e);
                    skipped += 1;
                }
            }
        }
        if pages.is_empty() {
            return Err(CheatstoreError::at_stage(
                "parse",
                CheatstoreError::Fetch {
                    source_desc: self.source.describe(),
                    reason: "no readable pages".to_string(),
                    cause: None,
                },
            ));
        }

        fs::rename(staging, target).map_err(|e| CheatstoreError::at_stage("commit", e.into()))?;

        let updated_at = Utc::now();
        let file = CatalogFile {
            version: CATALOG_VERSION,
            updated_at,
            generation: generation.to_string(),
            entries: pages.iter().map(|page| page.entry()).collect(),
        };
        write_catalog(&self.root, &file).map_err(|e| CheatstoreError::at_stage("commit", e))?;

        let report = UpdateReport {
            generation: generation.to_string(),
            pages: pages.len(),
            skipped,
            updated_at,
        };
        let catalog = Catalog {
            updated_at: Some(updated_at),
            generation: Some(generation.to_string()),
            pages,
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
        Ok(report)
    }

    /// Remove generations and staging directories older than `committed`.
    /// Runs under the update lock, so older staging directories belong to
    /// writers that are gone. Generation ids sort by creation time.
    fn prune_generations(&self, committed: &str) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let generation = name
                .strip_prefix(GENERATION_PREFIX)
                .or_else(|| name.strip_prefix(STAGING_PREFIX));
            if generation.is_some_and(|generation| generation < committed) {
                debug!("Removing old cache directory {}", name);
                remove_dir_quietly(&entry.path());
            }
        }
    }

    /// Exact-name lookup. When the name exists on several platforms the
    /// configured platform order decides. A page found on none of the
    /// configured platforms is still returned, first in catalog order.
    pub fn find_page(&self, name: &str) -> Result<Arc<Page>> {
        self.find_page_among(name, &self.preferred).or_else(|_| {
            self.snapshot()
                .pages
                .iter()
                .find(|page| page.name == name)
                .cloned()
                .ok_or_else(|| CheatstoreError::NotFound {
                    name: name.to_string(),
                })
        })
    }

    /// Exact-name lookup limited to `platforms`, earlier platforms first.
    pub fn find_page_among(&self, name: &str, platforms: &[Platform]) -> Result<Arc<Page>> {
        let catalog = self.snapshot();
        platforms
            .iter()
            .find_map(|platform| {
                catalog
                    .pages
                    .iter()
                    .find(|page| page.name == name && page.platform == *platform)
            })
            .cloned()
            .ok_or_else(|| CheatstoreError::NotFound {
                name: name.to_string(),
            })
    }

    /// Exact lookup on one platform.
    pub fn find_page_on(&self, name: &str, platform: Platform) -> Result<Arc<Page>> {
        self.snapshot()
            .pages
            .iter()
            .find(|page| page.name == name && page.platform == platform)
            .cloned()
            .ok_or_else(|| CheatstoreError::NotFound {
                name: format!("{}/{}", platform, name),
            })
    }

    pub fn search_pages(&self, query: &str, platforms: &[Platform]) -> Vec<Arc<Page>> {
        search::search_pages(self.snapshot().pages(), query, platforms)
    }

    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        search::suggest_names(self.snapshot().pages(), query, limit)
    }

    pub fn entries(&self) -> Vec<IndexEntry> {
        self.snapshot().pages.iter().map(|page| page.entry()).collect()
    }

    pub fn stats(&self) -> StoreStats {
        let catalog = self.snapshot();
        let mut by_platform = BTreeMap::new();
        for page in catalog.pages() {
            *by_platform.entry(page.platform.to_string()).or_insert(0) += 1;
        }
        let disk_bytes = if self.root.exists() {
            fs_extra::dir::get_size(&self.root).unwrap_or_else(|e| {
                warn!("Failed to measure {}: {}", self.root.display(), e);
                0
            })
        } else {
            0
        };

        StoreStats {
            cache_dir: self.root.display().to_string(),
            pages: catalog.len(),
            by_platform,
            updated_at: catalog.updated_at,
            stale: self.is_stale(),
            disk_bytes,
        }
    }
}

/// Exclusive claim on a cache directory for the span of one update. The lock
/// file is removed on drop.
struct UpdateLock {
    path: PathBuf,
}

impl UpdateLock {
    fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILENAME);
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = Self { path: path.clone() };
                    writeln!(file, "{} {}", process::id(), Utc::now().to_rfc3339())
                        .map_err(|e| CheatstoreError::at_stage("fetch", e.into()))?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !lock_is_abandoned(&path) {
                        debug!("Update lock {} is held", path.display());
                        return Err(CheatstoreError::UpdateConflict);
                    }
                    warn!("Removing abandoned update lock {}", path.display());
                    if let Err(e) = fs::remove_file(&path) {
                        if e.kind() != io::ErrorKind::NotFound {
                            return Err(CheatstoreError::at_stage("fetch", e.into()));
                        }
                    }
                }
                Err(e) => return Err(CheatstoreError::at_stage("fetch", e.into())),
            }
        }
        Err(CheatstoreError::UpdateConflict)
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release update lock {}: {}", self.path.display(), e);
        }
    }
}

/// The lock file holds `<pid> <rfc3339 timestamp>`. An unreadable or
/// half-written lock counts as held.
fn lock_is_abandoned(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    content
        .split_whitespace()
        .nth(1)
        .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
        .is_some_and(|taken| {
            Utc::now().signed_duration_since(taken) > TimeDelta::minutes(ABANDONED_LOCK_MINUTES)
        })
}

fn new_generation(root: &Path) -> String {
    let base = Utc::now().format("%Y%m%d%H%M%S%9f").to_string();
    let mut generation = base.clone();
    let mut counter = 1;
    while root.join(format!("{}{}", GENERATION_PREFIX, generation)).exists() {
        generation = format!("{}-{}", base, counter);
        counter += 1;
    }
    generation
}

fn write_catalog(root: &Path, file: &CatalogFile) -> Result<()> {
    let temp = root.join(format!("{}.tmp", CATALOG_FILENAME));
    let json = serde_json::to_vec_pretty(file)?;
    fs::write(&temp, json)?;
    fs::rename(&temp, root.join(CATALOG_FILENAME))?;
    Ok(())
}

/// Read the committed catalog, or an empty one when there is none. A corrupt
/// catalog file is treated as a cold cache.
fn load_committed(root: &Path, parser: &PageParser) -> Result<Catalog> {
    let path = root.join(CATALOG_FILENAME);
    if !path.exists() {
        return Ok(Catalog::default());
    }
    let content = fs::read_to_string(&path)?;
    let file: CatalogFile = match serde_json::from_str(&content) {
        Ok(file) => file,
        Err(e) => {
            warn!("Ignoring unreadable catalog {}: {}", path.display(), e);
            return Ok(Catalog::default());
        }
    };

    let pages_root = root.join(format!("{}{}", GENERATION_PREFIX, file.generation));
    let mut pages = Vec::with_capacity(file.entries.len());
    for entry in &file.entries {
        let document = document_path(&pages_root, entry);
        match fs::read_to_string(&document) {
            Ok(raw) => pages.push(Arc::new(parser.parse_page(&raw, entry))),
            Err(e) => warn!("Skipping cached page {}: {}", document.display(), e),
        }
    }

    Ok(Catalog {
        updated_at: Some(file.updated_at),
        generation: Some(file.generation),
        pages,
    })
}

fn remove_dir_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fetcher::{StagedCorpus, StagedDocument};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::thread;
    use tempfile::{tempdir, TempDir};

    /// Serves a fixed set of pages; every fetch bumps a version stamped into
    /// each page description.
    struct FixtureSource {
        pages: Vec<(Platform, &'static str)>,
        version: AtomicUsize,
        fail: bool,
    }

    impl FixtureSource {
        fn new(pages: Vec<(Platform, &'static str)>) -> Self {
            Self {
                pages,
                version: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    fn stage(staging: &Path, pages: &[(Platform, &str)], version: usize) -> Result<StagedCorpus> {
        let mut documents = Vec::new();
        for (platform, name) in pages {
            let entry = IndexEntry::new(*name, *platform);
            let path = document_path(staging, &entry);
            fs::create_dir_all(path.parent().expect("parent"))?;
            fs::write(
                &path,
                format!("# {name}\n> v{version}\n- Run it:\n`{name} {{{{file}}}}`\n"),
            )?;
            documents.push(StagedDocument { path, entry });
        }
        Ok(StagedCorpus {
            root: staging.to_path_buf(),
            documents,
        })
    }

    impl PageSource for FixtureSource {
        fn describe(&self) -> String {
            "fixture".to_string()
        }

        fn fetch(&self, staging: &Path) -> Result<StagedCorpus> {
            fs::create_dir_all(staging)?;
            if self.fail {
                return Err(CheatstoreError::Fetch {
                    source_desc: "fixture".to_string(),
                    reason: "network down".to_string(),
                    cause: None,
                });
            }
            let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
            stage(staging, &self.pages, version)
        }
    }

    /// Blocks inside `fetch` until released, to hold the writer lock.
    struct GatedSource {
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl PageSource for GatedSource {
        fn describe(&self) -> String {
            "gated".to_string()
        }

        fn fetch(&self, staging: &Path) -> Result<StagedCorpus> {
            fs::create_dir_all(staging)?;
            let _ = self.entered.lock().expect("lock").send(());
            let _ = self.release.lock().expect("lock").recv();
            stage(staging, &[(Platform::Common, "tar")], 1)
        }
    }

    fn config_in(temp: &TempDir) -> Config {
        Config {
            cache_dir: temp.path().join("cache"),
            ..Config::default()
        }
    }

    fn fixture_pages() -> Vec<(Platform, &'static str)> {
        vec![
            (Platform::Common, "tar"),
            (Platform::Linux, "apt"),
            (Platform::Osx, "open"),
            (Platform::Linux, "open"),
        ]
    }

    #[test]
    fn cold_store_is_not_initialized() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(&config_in(&temp), Box::new(FixtureSource::new(fixture_pages())))
            .expect("open");
        assert!(!store.is_initialized());
        assert!(store.is_stale());
        assert!(store.search_pages("tar", &Platform::ALL).is_empty());
        assert!(matches!(store.find_page("tar"), Err(CheatstoreError::NotFound { .. })));
    }

    #[test]
    fn initialize_commits_then_is_a_noop_while_fresh() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(&config_in(&temp), Box::new(FixtureSource::new(fixture_pages())))
            .expect("open");

        let first = store.initialize().expect("initialize");
        assert!(matches!(first, InitOutcome::Committed(ref report) if report.pages == 4));
        assert!(store.is_initialized());
        assert!(!store.is_stale());

        assert!(matches!(store.initialize().expect("again"), InitOutcome::AlreadyFresh));
        assert!(matches!(
            store.initialize_strict(),
            Err(CheatstoreError::AlreadyInitialized)
        ));
        assert_eq!(store.find_page("tar").expect("tar").description, "v1");
    }

    #[test]
    fn committed_catalog_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        {
            let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages())))
                .expect("open");
            store.update().expect("update");
        }

        let reopened = Store::open(&config, Box::new(FixtureSource::failing())).expect("reopen");
        assert!(reopened.is_initialized());
        assert_eq!(reopened.entries().len(), 4);
        let tar = reopened.find_page("tar").expect("tar");
        assert_eq!(tar.examples[0].command, "tar {{file}}");
        assert_eq!(tar.description, "v1");
    }

    #[test]
    fn failed_update_keeps_previous_catalog() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        {
            let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages())))
                .expect("open");
            store.update().expect("update");
        }
        let before = fs::read_to_string(config.cache_dir.join(CATALOG_FILENAME)).expect("catalog");

        let store = Store::open(&config, Box::new(FixtureSource::failing())).expect("reopen");
        let error = store.update().expect_err("must fail");
        assert!(matches!(error, CheatstoreError::Update { stage: "fetch", .. }));
        assert!(error.is_retryable());

        let after = fs::read_to_string(config.cache_dir.join(CATALOG_FILENAME)).expect("catalog");
        assert_eq!(before, after);
        assert_eq!(store.entries().len(), 4);
        let leftovers: Vec<String> = fs::read_dir(&config.cache_dir)
            .expect("read dir")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
        assert!(!config.cache_dir.join(LOCK_FILENAME).exists());
    }

    #[test]
    fn stale_catalog_is_kept_when_refresh_fails() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_in(&temp);
        config.cache_ttl_hours = 0;
        {
            let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages())))
                .expect("open");
            store.update().expect("update");
        }

        let store = Store::open(&config, Box::new(FixtureSource::failing())).expect("reopen");
        assert!(store.is_stale());
        let outcome = store.initialize().expect("initialize");
        assert!(matches!(outcome, InitOutcome::KeptStale(_)));
        assert!(store.find_page("apt").is_ok());
    }

    #[test]
    fn cold_cache_with_failed_fetch_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(&config_in(&temp), Box::new(FixtureSource::failing())).expect("open");
        let error = store.initialize().expect_err("must fail");
        assert!(matches!(error, CheatstoreError::ColdCache { .. }));
    }

    #[test]
    fn update_replaces_catalog_and_prunes_old_generations() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages()))).expect("open");

        let first = store.update().expect("first");
        let held = store.find_page("tar").expect("tar");
        let second = store.update().expect("second");
        assert_ne!(first.generation, second.generation);

        assert_eq!(held.description, "v1");
        assert_eq!(store.find_page("tar").expect("tar").description, "v2");

        let generations: Vec<String> = fs::read_dir(&config.cache_dir)
            .expect("read dir")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(GENERATION_PREFIX))
            .collect();
        assert_eq!(generations, vec![format!("{}{}", GENERATION_PREFIX, second.generation)]);
    }

    #[test]
    fn find_page_prefers_configured_platform_order() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_in(&temp);
        config.platforms = vec![Platform::Linux, Platform::Osx];
        let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages()))).expect("open");
        store.update().expect("update");

        assert_eq!(store.find_page("open").expect("open").platform, Platform::Linux);
        assert_eq!(
            store.find_page_on("open", Platform::Osx).expect("osx").platform,
            Platform::Osx
        );
        assert!(store.find_page_on("apt", Platform::Windows).is_err());
    }

    #[test]
    fn find_page_among_does_not_fall_back() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_in(&temp);
        config.platforms = vec![Platform::Osx];
        let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages()))).expect("open");
        store.update().expect("update");

        assert_eq!(store.find_page("apt").expect("fallback").platform, Platform::Linux);
        assert!(matches!(
            store.find_page_among("apt", &[Platform::Osx]),
            Err(CheatstoreError::NotFound { .. })
        ));
        assert_eq!(
            store
                .find_page_among("open", &[Platform::Windows, Platform::Linux])
                .expect("open")
                .platform,
            Platform::Linux
        );
    }

    #[test]
    fn search_respects_platform_filter() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(&config_in(&temp), Box::new(FixtureSource::new(fixture_pages())))
            .expect("open");
        store.update().expect("update");

        let osx = store.search_pages("open", &[Platform::Osx]);
        assert_eq!(osx.len(), 1);
        assert_eq!(osx[0].platform, Platform::Osx);
        assert!(store.search_pages("open", &[]).is_empty());
        assert!(store.search_pages("apt", &[Platform::Windows]).is_empty());
        assert_eq!(store.suggest("op", 5), vec!["open"]);
    }

    #[test]
    fn concurrent_update_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        let source = GatedSource {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let store = Arc::new(Store::open(&config_in(&temp), Box::new(source)).expect("open"));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.update())
        };
        entered_rx.recv().expect("writer entered fetch");

        assert!(matches!(store.update(), Err(CheatstoreError::UpdateConflict)));
        assert!(!store.is_initialized());

        release_tx.send(()).expect("release");
        let report = writer.join().expect("join").expect("update");
        assert_eq!(report.pages, 1);
        assert!(store.is_initialized());
    }

    #[test]
    fn second_store_on_same_cache_dir_is_rejected_while_updating() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        let gated = Store::open(
            &config,
            Box::new(GatedSource {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
        )
        .expect("open gated");
        let other = Store::open(&config, Box::new(FixtureSource::new(fixture_pages())))
            .expect("open other");

        let writer = thread::spawn(move || gated.update());
        entered_rx.recv().expect("writer entered fetch");

        assert!(matches!(other.update(), Err(CheatstoreError::UpdateConflict)));

        release_tx.send(()).expect("release");
        writer.join().expect("join").expect("update");
        assert!(!config.cache_dir.join(LOCK_FILENAME).exists());

        other.update().expect("update after release");
        let reopened = Store::open(&config, Box::new(FixtureSource::failing())).expect("reopen");
        assert_eq!(reopened.entries().len(), 4);
    }

    #[test]
    fn racing_stores_never_lose_the_committed_catalog() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);

        for _ in 0..20 {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let config = config.clone();
                    thread::spawn(move || {
                        Store::open(&config, Box::new(FixtureSource::new(fixture_pages())))
                            .expect("open")
                            .update()
                    })
                })
                .collect();

            let mut committed = 0;
            for handle in handles {
                match handle.join().expect("join") {
                    Ok(_) => committed += 1,
                    Err(CheatstoreError::UpdateConflict) => {}
                    Err(e) => panic!("unexpected update error: {e}"),
                }
            }
            assert!(committed >= 1);

            let reopened = Store::open(&config, Box::new(FixtureSource::failing())).expect("reopen");
            assert_eq!(reopened.entries().len(), 4);
            let generation = reopened.snapshot().generation().map(str::to_string).expect("generation");
            assert!(config
                .cache_dir
                .join(format!("{}{}", GENERATION_PREFIX, generation))
                .is_dir());
        }
    }

    #[test]
    fn held_lock_blocks_and_abandoned_lock_is_taken_over() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        fs::create_dir_all(&config.cache_dir).expect("mkdir");
        let lock = config.cache_dir.join(LOCK_FILENAME);
        let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages()))).expect("open");

        fs::write(&lock, format!("4242 {}\n", Utc::now().to_rfc3339())).expect("write lock");
        assert!(matches!(store.update(), Err(CheatstoreError::UpdateConflict)));
        assert!(lock.exists());

        let old = Utc::now() - TimeDelta::hours(2);
        fs::write(&lock, format!("4242 {}\n", old.to_rfc3339())).expect("write lock");
        store.update().expect("update");
        assert!(!lock.exists());
    }

    #[test]
    fn prune_keeps_newer_directories() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        let store = Store::open(&config, Box::new(FixtureSource::new(fixture_pages()))).expect("open");
        fs::create_dir_all(config.cache_dir.join(".staging-00000000000000000000000")).expect("mkdir");
        fs::create_dir_all(config.cache_dir.join("pages-99999999999999999999999")).expect("mkdir");

        let report = store.update().expect("update");

        assert!(!config.cache_dir.join(".staging-00000000000000000000000").exists());
        assert!(config.cache_dir.join("pages-99999999999999999999999").exists());
        assert!(config
            .cache_dir
            .join(format!("{}{}", GENERATION_PREFIX, report.generation))
            .is_dir());
    }

    #[test]
    fn readers_never_see_a_mixed_catalog() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(
            Store::open(&config_in(&temp), Box::new(FixtureSource::new(fixture_pages())))
                .expect("open"),
        );
        store.update().expect("seed");

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let pages = store.search_pages("", &Platform::ALL);
                    assert_eq!(pages.len(), 4);
                    let first = &pages[0].description;
                    assert!(pages.iter().all(|page| &page.description == first));
                }
            })
        };
        for _ in 0..5 {
            store.update().expect("update");
        }
        reader.join().expect("reader");
    }

    #[test]
    fn stats_report_counts() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(&config_in(&temp), Box::new(FixtureSource::new(fixture_pages())))
            .expect("open");
        store.update().expect("update");

        let stats = store.stats();
        assert_eq!(stats.pages, 4);
        assert_eq!(stats.by_platform.get("linux"), Some(&2));
        assert!(stats.disk_bytes > 0);
        assert!(!stats.stale);
    }
}
