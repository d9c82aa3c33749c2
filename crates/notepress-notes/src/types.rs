use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{NoteError, Result};

/// Publication state of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Draft,
    Scheduled,
    Published,
}

impl std::fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NoteStatus::Draft => "draft",
            NoteStatus::Scheduled => "scheduled",
            NoteStatus::Published => "published",
        };
        write!(f, "{s}")
    }
}

/// Structured metadata at the top of every note file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Authored date. Publishing leaves it alone unless `stamp_publish_date` is set.
    #[serde(deserialize_with = "timestamp")]
    pub date: DateTime<Utc>,
    pub status: NoteStatus,
    #[serde(
        default,
        deserialize_with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Opt-in: replace `date` with the actual publish instant.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stamp_publish_date: bool,
    /// Keys this crate does not interpret; written back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    /// Check the per-note invariants.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(NoteError::Invalid("title must not be empty".to_string()));
        }
        match (self.status, self.scheduled_for) {
            (NoteStatus::Scheduled, None) => Err(NoteError::Invalid(
                "scheduled note is missing scheduledFor".to_string(),
            )),
            (NoteStatus::Draft | NoteStatus::Published, Some(_)) => Err(NoteError::Invalid(
                format!("scheduledFor is only allowed on scheduled notes, found {}", self.status),
            )),
            _ => Ok(()),
        }
    }

    /// True when the note is scheduled and its time has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == NoteStatus::Scheduled && self.scheduled_for.is_some_and(|at| at <= now)
    }

    /// Apply the `scheduled → published` transition.
    ///
    /// `now` is only consulted when the note opted into publish-time stamping.
    pub fn into_published(mut self, now: DateTime<Utc>) -> Result<Self> {
        if self.status != NoteStatus::Scheduled {
            return Err(NoteError::Transition {
                from: self.status,
                to: NoteStatus::Published,
            });
        }
        self.status = NoteStatus::Published;
        self.scheduled_for = None;
        if self.stamp_publish_date {
            self.date = now;
            self.stamp_publish_date = false;
        }
        Ok(self)
    }
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid timestamp: {raw:?}"))
}

fn timestamp<'de, D>(de: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn optional_timestamp<'de, D>(de: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(de)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
