use std::path::PathBuf;

/// Errors surfaced by normalization, indexing, persistence and the variant catalog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A language resource (stopword list or stemmer) could not be loaded.
    #[error("failed to load {resource}: {reason}")]
    ResourceLoad { resource: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Document text could not be normalized; the document is skipped, not the build.
    #[error("malformed text in document {doc_id}: {reason}")]
    MalformedText { doc_id: String, reason: String },
    #[error("document {0} was already added to this index")]
    DuplicateDocument(String),
    /// A persisted index is missing, truncated, corrupt or of an unknown version.
    #[error("index unavailable at {path}: {reason}")]
    IndexUnavailable { path: PathBuf, reason: String },
    #[error("unknown variant: {0}")]
    UnknownVariant(String),
    #[error("no variants have been built")]
    EmptyCatalog,
    #[error("variant {0} is already registered")]
    DuplicateVariant(String),
    #[error("invalid variant name {0:?}: use letters, digits, '-' or '_'")]
    InvalidVariantName(String),
    #[error("corpus error: {0}")]
    Corpus(String),
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::IndexUnavailable { path: path.into(), reason: reason.to_string() }
    }
}
