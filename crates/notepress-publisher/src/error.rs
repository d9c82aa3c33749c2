use notepress_notes::NoteError;
use notepress_store::StoreError;
use thiserror::Error;

/// Errors that can occur while publishing a note.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Every commit attempt lost the race against another writer.
    #[error("gave up on {slug} after {attempts} conflicting commits")]
    ConflictExhausted { slug: String, attempts: u32 },

    /// Underlying store failure (unavailable, API error, malformed file).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The note could not be transitioned or rendered.
    #[error(transparent)]
    Note(#[from] NoteError),
}

pub type Result<T> = std::result::Result<T, PublishError>;
