use crate::config::Config;
use crate::error::{CheatstoreError, Result};
use crate::types::{IndexEntry, Platform};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;
use zip::ZipArchive;

/// One extracted document waiting in the staging directory.
#[derive(Debug, Clone)]
pub struct StagedDocument {
    pub path: PathBuf,
    pub entry: IndexEntry,
}

#[derive(Debug, Clone)]
pub struct StagedCorpus {
    pub root: PathBuf,
    pub documents: Vec<StagedDocument>,
}

/// Anything that can fill a staging directory with raw page documents.
pub trait PageSource: Send + Sync {
    fn describe(&self) -> String;

    /// Write documents under `staging` as `<platform>/<name>.md`. Must not
    /// touch anything outside `staging`.
    fn fetch(&self, staging: &Path) -> Result<StagedCorpus>;
}

enum SourceKind {
    Url(Url),
    ZipFile(PathBuf),
    Directory(PathBuf),
}

/// Fetches the page corpus from a remote zip, a local zip, or an unpacked checkout.
pub struct ArchiveFetcher {
    source: String,
    timeout: Duration,
}

impl ArchiveFetcher {
    pub fn new(source: impl Into<String>, timeout: Duration) -> Self {
        Self {
            source: source.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.archive_source.clone(), config.timeout())
    }

    fn is_url(source: &str) -> bool {
        source.starts_with("http://") || source.starts_with("https://")
    }

    fn classify(&self) -> Result<SourceKind> {
        if Self::is_url(&self.source) {
            return Ok(SourceKind::Url(Url::parse(&self.source)?));
        }
        let path = PathBuf::from(&self.source);
        if path.is_dir() {
            Ok(SourceKind::Directory(path))
        } else if path.is_file() {
            Ok(SourceKind::ZipFile(path))
        } else {
            Err(self.failure(format!("no such file or directory: {}", path.display())))
        }
    }

    fn failure(&self, reason: impl Into<String>) -> CheatstoreError {
        CheatstoreError::Fetch {
            source_desc: self.source.clone(),
            reason: reason.into(),
            cause: None,
        }
    }

    fn failure_from(&self, cause: CheatstoreError) -> CheatstoreError {
        let reason = match &cause {
            CheatstoreError::Http(_) | CheatstoreError::HttpStatus { .. } => "download failed",
            CheatstoreError::InvalidUrl(_) => "invalid URL",
            CheatstoreError::Zip(_) => "unreadable archive",
            CheatstoreError::Io(_) => "local I/O error",
            _ => "unexpected error",
        };
        CheatstoreError::Fetch {
            source_desc: self.source.clone(),
            reason: reason.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    fn download(&self, url: &Url) -> Result<Vec<u8>> {
        info!("Downloading page archive from URL: {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client.get(url.clone()).send()?;

        if !response.status().is_success() {
            return Err(CheatstoreError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes()?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    fn fetch_inner(&self, staging: &Path) -> Result<Vec<StagedDocument>> {
        fs::create_dir_all(staging)?;
        match self.classify()? {
            SourceKind::Url(url) => {
                let bytes = self.download(&url)?;
                extract_zip(Cursor::new(bytes), staging)
            }
            SourceKind::ZipFile(path) => {
                info!("Reading page archive: {}", path.display());
                let file = fs::File::open(&path)?;
                extract_zip(file, staging)
            }
            SourceKind::Directory(path) => {
                info!("Copying pages from directory: {}", path.display());
                copy_directory(&path, staging)
            }
        }
    }
}

impl PageSource for ArchiveFetcher {
    fn describe(&self) -> String {
        self.source.clone()
    }

    fn fetch(&self, staging: &Path) -> Result<StagedCorpus> {
        let documents = match self.fetch_inner(staging) {
            Ok(documents) => documents,
            Err(e @ CheatstoreError::Fetch { .. }) => return Err(e),
            Err(e) => return Err(self.failure_from(e)),
        };

        if documents.is_empty() {
            return Err(self.failure("archive contained no pages"));
        }

        info!("Staged {} documents from {}", documents.len(), self.source);
        Ok(StagedCorpus {
            root: staging.to_path_buf(),
            documents,
        })
    }
}

/// Map `[…/]pages/<platform>/<name>.md` to a provisional catalog entry.
/// Translated trees (`pages.de/…`) and unknown platforms yield `None`.
pub fn entry_for_path(path: &Path) -> Option<IndexEntry> {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|component| component.as_os_str().to_str())
        .collect();
    let [.., pages, platform, file] = parts.as_slice() else {
        return None;
    };
    if *pages != "pages" {
        return None;
    }
    let platform = Platform::parse(platform)?;
    let name = file.strip_suffix(".md")?;
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(IndexEntry::new(name, platform))
}

/// Location of a document inside a staging or committed pages tree.
pub fn document_path(root: &Path, entry: &IndexEntry) -> PathBuf {
    root.join(entry.platform.as_str())
        .join(format!("{}.md", entry.name))
}

fn extract_zip<R: Read + Seek>(reader: R, staging: &Path) -> Result<Vec<StagedDocument>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if !file.is_file() {
            continue;
        }
        let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
            warn!("Skipping archive entry with unsafe path: {}", file.name());
            continue;
        };
        let Some(entry) = entry_for_path(&relative) else {
            debug!("Skipping archive entry: {}", relative.display());
            continue;
        };
        if !seen.insert((entry.platform, entry.name.clone())) {
            continue;
        }

        let target = document_path(staging, &entry);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = fs::File::create(&target)?;
        io::copy(&mut file, &mut output)?;
        documents.push(StagedDocument {
            path: target,
            entry,
        });
    }

    Ok(documents)
}

fn copy_directory(root: &Path, staging: &Path) -> Result<Vec<StagedDocument>> {
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for item in WalkDir::new(root).sort_by_file_name() {
        let item = item.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if !item.file_type().is_file() {
            continue;
        }
        let Some(entry) = entry_for_path(item.path()) else {
            continue;
        };
        if !seen.insert((entry.platform, entry.name.clone())) {
            continue;
        }

        let target = document_path(staging, &entry);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(item.path(), &target)?;
        documents.push(StagedDocument {
            path: target,
            entry,
        });
    }

    Ok(documents)
}
