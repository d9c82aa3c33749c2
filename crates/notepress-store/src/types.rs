use notepress_notes::{Frontmatter, Note, Slug};
use serde::{Deserialize, Serialize};

/// Opaque identifier of one stored revision of a note file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionMarker(String);

impl RevisionMarker {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing entry: enough to decide whether a note is a publish candidate.
#[derive(Debug, Clone)]
pub struct NoteSummary {
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    pub revision: RevisionMarker,
}

/// A full note together with the revision it was read at.
#[derive(Debug, Clone)]
pub struct StoredNote {
    pub note: Note,
    pub revision: RevisionMarker,
}

impl StoredNote {
    pub fn summary(&self) -> NoteSummary {
        NoteSummary {
            slug: self.note.slug.clone(),
            frontmatter: self.note.frontmatter.clone(),
            revision: self.revision.clone(),
        }
    }
}
