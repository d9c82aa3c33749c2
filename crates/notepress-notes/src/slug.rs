use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NoteError, Result};

/// Stable note identifier, also the storage key and URL path.
///
/// Shape: one or more `/`-separated segments of `[a-z0-9-]`, e.g.
/// `2024/03/hello-world`. A slug is derived once when the note is created and
/// never rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validate and wrap an existing slug string.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    /// Build the canonical `YYYY/MM/<kebab-title>` slug for a new note.
    pub fn derive(title: &str, date: DateTime<Utc>) -> Self {
        let mut kebab = String::with_capacity(title.len());
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                kebab.push(c.to_ascii_lowercase());
            } else if !kebab.is_empty() && !kebab.ends_with('-') {
                kebab.push('-');
            }
        }
        let kebab = kebab.trim_end_matches('-');
        let kebab = if kebab.is_empty() { "untitled" } else { kebab };

        Self(format!("{:04}/{:02}/{}", date.year(), date.month(), kebab))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(raw: &str) -> Result<()> {
    let invalid = |reason: &str| NoteError::InvalidSlug {
        slug: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid("empty"));
    }
    for segment in raw.split('/') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid("segments may only contain a-z, 0-9 and '-'"));
        }
    }
    Ok(())
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self> {
        Slug::new(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = NoteError;

    fn try_from(value: String) -> Result<Self> {
        Slug::new(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
