use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheatstoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Catalog serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Fetch from {source_desc} failed: {reason}")]
    Fetch {
        source_desc: String,
        reason: String,
        #[source]
        cause: Option<Box<CheatstoreError>>,
    },

    #[error("HTTP status error: {status}")]
    HttpStatus { status: u16 },

    #[error("Page not found: {name}")]
    NotFound { name: String },

    #[error("Page '{page}' has no examples")]
    NoExample { page: String },

    #[error("An update is already in progress")]
    UpdateConflict,

    #[error("Cache is already initialized")]
    AlreadyInitialized,

    #[error("Update failed during {stage}: {source}")]
    Update {
        stage: &'static str,
        #[source]
        source: Box<CheatstoreError>,
    },

    #[error("No cached pages and the first fetch failed: {source}")]
    ColdCache {
        #[source]
        source: Box<CheatstoreError>,
    },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Plugin '{name}' failed: {reason}")]
    Plugin { name: String, reason: String },
}

impl CheatstoreError {
    pub(crate) fn at_stage(stage: &'static str, source: CheatstoreError) -> Self {
        Self::Update {
            stage,
            source: Box::new(source),
        }
    }

    /// Network and archive failures are worth retrying by calling `update`
    /// again. Local disk errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch {
                cause: Some(cause), ..
            } => cause.is_retryable(),
            Self::Zip(zip::result::ZipError::Io(_)) => false,
            Self::Fetch { cause: None, .. }
            | Self::Http(_)
            | Self::HttpStatus { .. }
            | Self::Zip(_) => true,
            Self::Update { source, .. } | Self::ColdCache { source } => source.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CheatstoreError>;
