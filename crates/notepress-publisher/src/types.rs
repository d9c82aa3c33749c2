use std::time::Duration;

use chrono::{DateTime, Utc};
use notepress_notes::{NoteStatus, Slug};
use notepress_store::RevisionMarker;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PublishError;

/// Tuning knobs for [`PublishService`](crate::PublishService).
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Commit attempts per note before reporting `ConflictExhausted`.
    pub max_attempts: u32,
    /// Deadline for every individual store call.
    pub store_timeout: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            store_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a publish call left the note untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The note disappeared between listing and reading.
    NotFound,
    /// Someone else already published it.
    AlreadyPublished,
    /// The note is in a state the scheduler never touches (e.g. `draft`).
    NotScheduled { status: NoteStatus },
    /// Still scheduled, but for a later time than the batch clock.
    NotYetDue { scheduled_for: DateTime<Utc> },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "note not found"),
            SkipReason::AlreadyPublished => write!(f, "already published"),
            SkipReason::NotScheduled { status } => write!(f, "status is {status}, not scheduled"),
            SkipReason::NotYetDue { scheduled_for } => {
                write!(f, "scheduled for {}", scheduled_for.to_rfc3339())
            }
        }
    }
}

/// Successful result of [`PublishService::publish`](crate::PublishService::publish).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published {
        revision: RevisionMarker,
        /// Commit attempts used, 1 when there was no conflict.
        attempts: u32,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Per-note line of a batch report, as returned to the trigger caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Published { revision: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl From<std::result::Result<PublishOutcome, PublishError>> for ReportOutcome {
    fn from(result: std::result::Result<PublishOutcome, PublishError>) -> Self {
        match result {
            Ok(PublishOutcome::Published { revision, .. }) => ReportOutcome::Published {
                revision: revision.to_string(),
            },
            Ok(PublishOutcome::Skipped { reason }) => ReportOutcome::Skipped {
                reason: reason.to_string(),
            },
            Err(e) => ReportOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteReport {
    pub slug: Slug,
    pub title: String,
    pub outcome: ReportOutcome,
}

/// Summary of one scan-and-publish pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    /// Clock value the batch was evaluated against.
    pub now: DateTime<Utc>,
    /// Candidates found at scan time; always equals `results.len()`.
    pub processed: usize,
    pub results: Vec<NoteReport>,
}

impl BatchResult {
    pub fn published_count(&self) -> usize {
        self.count(|o| matches!(o, ReportOutcome::Published { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, ReportOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, ReportOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ReportOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notepress_store::StoreError;

    #[test]
    fn report_outcome_json_shape() {
        let published: ReportOutcome = Ok(PublishOutcome::Published {
            revision: RevisionMarker::new("abc"),
            attempts: 1,
        })
        .into();
        let json = serde_json::to_value(&published).unwrap();
        assert_eq!(json, serde_json::json!({"status": "published", "revision": "abc"}));

        let failed: ReportOutcome =
            Err(PublishError::Store(StoreError::Unavailable("down".to_string()))).into();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json["error"].as_str().unwrap().contains("down"));
    }

    #[test]
    fn skip_reasons_render_readably() {
        let reason = SkipReason::NotScheduled {
            status: NoteStatus::Draft,
        };
        assert_eq!(reason.to_string(), "status is draft, not scheduled");
        assert_eq!(SkipReason::AlreadyPublished.to_string(), "already published");
    }
}
