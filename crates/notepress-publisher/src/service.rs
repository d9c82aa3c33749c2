use std::sync::Arc;

use chrono::{DateTime, Utc};
use notepress_notes::{Note, NoteStatus, Slug};
use notepress_store::{bounded, ContentStore, NoteSummary, StoreError, StoredNote};
use tracing::{debug, info, warn};

use crate::error::{PublishError, Result};
use crate::types::{PublishOptions, PublishOutcome, SkipReason};

/// Transitions single notes from `scheduled` to `published`.
///
/// Holds no locks and no per-note state. Mutual exclusion with other writers
/// comes entirely from the store's expected-revision check on commit.
pub struct PublishService {
    store: Arc<dyn ContentStore>,
    options: PublishOptions,
}

impl PublishService {
    pub fn new(store: Arc<dyn ContentStore>, options: PublishOptions) -> Self {
        Self { store, options }
    }

    /// Notes due at `now`, listed under the store deadline.
    pub async fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<NoteSummary>> {
        let due = bounded(
            self.options.store_timeout,
            "list_scheduled",
            self.store.list_scheduled(now),
        )
        .await?;
        Ok(due)
    }

    /// Publish `slug` if it is still scheduled and due at `now`.
    ///
    /// Re-running this on an already published note returns
    /// [`PublishOutcome::Skipped`], so repeated batches are harmless.
    /// Conflicting commits are retried against a fresh read up to
    /// `max_attempts` times; transient store failures are returned
    /// immediately for the next batch to retry.
    pub async fn publish(&self, slug: &Slug, now: DateTime<Utc>) -> Result<PublishOutcome> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut stored = match self.read(slug).await? {
            Some(stored) => stored,
            None => return Ok(skipped(slug, SkipReason::NotFound)),
        };

        for attempt in 1..=max_attempts {
            if let Some(reason) = precondition(&stored.note, now) {
                return Ok(skipped(slug, reason));
            }

            let frontmatter = stored.note.frontmatter.clone().into_published(now)?;
            let mutated = Note {
                frontmatter,
                ..stored.note.clone()
            };
            let message = format!("Publish: {}", mutated.title());

            let commit = self
                .store
                .commit(slug, &mutated, &stored.revision, &message);
            match bounded(self.options.store_timeout, "commit", commit).await {
                Ok(revision) => {
                    info!(%slug, %revision, attempt, "note published");
                    return Ok(PublishOutcome::Published {
                        revision,
                        attempts: attempt,
                    });
                }
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(%slug, attempt, max_attempts, "commit conflicted with another writer");
                    if attempt == max_attempts {
                        break;
                    }
                    stored = match self.read(slug).await? {
                        Some(fresh) => fresh,
                        None => return Ok(skipped(slug, SkipReason::NotFound)),
                    };
                }
                Err(StoreError::NotFound { .. }) => {
                    return Ok(skipped(slug, SkipReason::NotFound));
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(%slug, error = %e, "store unavailable; note stays scheduled");
                    }
                    return Err(e.into());
                }
            }
        }

        Err(PublishError::ConflictExhausted {
            slug: slug.to_string(),
            attempts: max_attempts,
        })
    }

    /// Read under the store deadline; a missing note is `Ok(None)`.
    async fn read(&self, slug: &Slug) -> Result<Option<StoredNote>> {
        match bounded(self.options.store_timeout, "read", self.store.read(slug)).await {
            Ok(stored) => {
                debug!(%slug, revision = %stored.revision, "read note");
                Ok(Some(stored))
            }
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `None` when the note may be published now, otherwise why not.
fn precondition(note: &Note, now: DateTime<Utc>) -> Option<SkipReason> {
    let fm = &note.frontmatter;
    match fm.status {
        NoteStatus::Published => Some(SkipReason::AlreadyPublished),
        NoteStatus::Draft => Some(SkipReason::NotScheduled { status: fm.status }),
        NoteStatus::Scheduled => match fm.scheduled_for {
            Some(at) if at > now => Some(SkipReason::NotYetDue { scheduled_for: at }),
            _ => None,
        },
    }
}

fn skipped(slug: &Slug, reason: SkipReason) -> PublishOutcome {
    info!(%slug, %reason, "publish skipped");
    PublishOutcome::Skipped { reason }
}
