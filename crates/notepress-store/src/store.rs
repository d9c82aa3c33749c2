use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notepress_notes::{Note, Slug};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::types::{NoteSummary, RevisionMarker, StoredNote};

/// Read/list/commit access to note files in a versioned repository.
///
/// Every write names the revision it expects to replace. Implementations must
/// reject the write with [`StoreError::VersionConflict`] when the stored
/// revision differs, so concurrent writers (other processes, an admin editing
/// by hand) are detected rather than overwritten.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Every note with its frontmatter and current revision, in no particular order.
    async fn list_all(&self) -> Result<Vec<NoteSummary>>;

    /// Notes whose scheduled time is at or before `now`.
    ///
    /// There is no index behind this; it filters the full listing.
    async fn list_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<NoteSummary>> {
        let all = self.list_all().await?;
        Ok(all
            .into_iter()
            .filter(|summary| summary.frontmatter.is_due(now))
            .collect())
    }

    /// Full note plus its current revision. Missing → [`StoreError::NotFound`].
    async fn read(&self, slug: &Slug) -> Result<StoredNote>;

    /// Write `note` as a new revision on top of `expected`.
    ///
    /// Returns the new revision marker.
    async fn commit(
        &self,
        slug: &Slug,
        note: &Note,
        expected: &RevisionMarker,
        message: &str,
    ) -> Result<RevisionMarker>;
}

/// Run one store operation under a deadline.
///
/// An elapsed deadline is reported as [`StoreError::Unavailable`] so callers
/// treat it like any other transient remote failure.
pub async fn bounded<T, F>(timeout: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            let ms = timeout.as_millis() as u64;
            warn!(op, timeout_ms = ms, "store operation timed out");
            Err(StoreError::Unavailable(format!("{op} timed out after {ms}ms")))
        }
    }
}
