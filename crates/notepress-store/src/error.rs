use thiserror::Error;

/// Errors surfaced by any [`ContentStore`](crate::ContentStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No file exists for the slug.
    #[error("note not found: {slug}")]
    NotFound { slug: String },

    /// The file changed since `expected` was read.
    #[error("version conflict on {slug}: expected revision {expected} is stale")]
    VersionConflict { slug: String, expected: String },

    /// Transient failure: network error, timeout, 5xx or rate limiting.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success reply from the remote (bad credentials, etc).
    #[error("store API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A stored file could not be parsed as a note.
    #[error("malformed note {slug}: {reason}")]
    Malformed { slug: String, reason: String },
}

impl StoreError {
    /// Whether a later attempt can reasonably succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
