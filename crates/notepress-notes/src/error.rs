use thiserror::Error;

use crate::types::NoteStatus;

/// Errors raised while parsing, validating or transitioning a note.
#[derive(Debug, Error)]
pub enum NoteError {
    /// The file has no `---` delimited frontmatter block.
    #[error("missing frontmatter block")]
    MissingFrontmatter,

    /// The frontmatter block is not valid YAML for a note.
    #[error("frontmatter parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid slug {slug:?}: {reason}")]
    InvalidSlug { slug: String, reason: String },

    /// Frontmatter parsed but violates a note invariant.
    #[error("invalid note: {0}")]
    Invalid(String),

    #[error("cannot transition note from {from} to {to}")]
    Transition { from: NoteStatus, to: NoteStatus },
}

pub type Result<T> = std::result::Result<T, NoteError>;
