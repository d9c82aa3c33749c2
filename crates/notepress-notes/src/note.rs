use chrono::Datelike;

use crate::error::{NoteError, Result};
use crate::slug::Slug;
use crate::types::Frontmatter;

/// A single content item: frontmatter plus markdown body.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl Note {
    /// Parse a raw note file. The frontmatter must satisfy [`Frontmatter::validate`].
    pub fn parse(slug: Slug, raw: &str) -> Result<Self> {
        let (yaml, body) = split_frontmatter(raw).ok_or(NoteError::MissingFrontmatter)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;
        frontmatter.validate()?;
        Ok(Self {
            slug,
            frontmatter,
            body: body.to_string(),
        })
    }

    /// Render back to the on-disk file layout.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.frontmatter)?;
        Ok(format!("---\n{yaml}---\n\n{}", self.body))
    }

    /// `(year, month)` URL/path segments, zero padded, from the note's date.
    pub fn path_segments(&self) -> (String, String) {
        let date = self.frontmatter.date;
        (format!("{:04}", date.year()), format!("{:02}", date.month()))
    }

    pub fn title(&self) -> &str {
        &self.frontmatter.title
    }
}

/// Split `---\n<yaml>\n---\n<body>` into its YAML and body parts.
fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.trim_start_matches('\u{feff}').trim_start();
    let rest = rest.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    None
}
