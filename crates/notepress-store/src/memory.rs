use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use notepress_notes::{Note, Slug};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::store::ContentStore;
use crate::types::{NoteSummary, RevisionMarker, StoredNote};

/// Callback run just before a commit of a given slug is checked.
pub type CommitHook = Box<dyn FnOnce(&MemoryStore) + Send + Sync>;

struct Entry {
    revision: RevisionMarker,
    content: String,
}

/// In-process store with the same revision contract as the remote backends.
///
/// Files are held as rendered text, so every read goes through the same parse
/// path as a real repository. Also used by tests to script concurrent writers
/// and remote failures.
#[derive(Default)]
pub struct MemoryStore {
    files: DashMap<Slug, Entry>,
    generation: AtomicU64,
    failing_reads: DashSet<Slug>,
    commit_hooks: DashMap<Slug, Vec<CommitHook>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional write, as an admin editing the file directly would do.
    pub fn insert(&self, note: &Note) -> Result<RevisionMarker> {
        let content = render(note)?;
        Ok(self.insert_raw(&note.slug, content))
    }

    /// Store raw file text without parsing it.
    pub fn insert_raw(&self, slug: &Slug, content: impl Into<String>) -> RevisionMarker {
        let content = content.into();
        let revision = self.next_revision(slug, &content);
        self.files.insert(
            slug.clone(),
            Entry {
                revision: revision.clone(),
                content,
            },
        );
        revision
    }

    /// Raw file text currently stored for `slug`.
    pub fn raw(&self, slug: &Slug) -> Option<String> {
        self.files.get(slug).map(|e| e.content.clone())
    }

    pub fn revision(&self, slug: &Slug) -> Option<RevisionMarker> {
        self.files.get(slug).map(|e| e.revision.clone())
    }

    pub fn remove(&self, slug: &Slug) {
        self.files.remove(slug);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Make every subsequent read of `slug` fail as if the remote were down.
    pub fn fail_reads_for(&self, slug: &Slug) {
        self.failing_reads.insert(slug.clone());
    }

    /// Queue `hook` to run right before the next commit of `slug` checks its
    /// expected revision. Hooks queue up; each commit consumes one.
    pub fn on_next_commit<F>(&self, slug: &Slug, hook: F)
    where
        F: FnOnce(&MemoryStore) + Send + Sync + 'static,
    {
        self.commit_hooks
            .entry(slug.clone())
            .or_default()
            .push(Box::new(hook));
    }

    fn take_hook(&self, slug: &Slug) -> Option<CommitHook> {
        let mut hooks = self.commit_hooks.get_mut(slug)?;
        if hooks.is_empty() {
            None
        } else {
            Some(hooks.remove(0))
        }
    }

    fn next_revision(&self, slug: &Slug, content: &str) -> RevisionMarker {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(slug.as_str().as_bytes());
        hasher.update(generation.to_be_bytes());
        hasher.update(content.as_bytes());
        RevisionMarker::new(hex::encode(hasher.finalize()))
    }

    fn parse(slug: &Slug, entry: &Entry) -> Result<StoredNote> {
        let note = Note::parse(slug.clone(), &entry.content).map_err(|e| StoreError::Malformed {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;
        Ok(StoredNote {
            note,
            revision: entry.revision.clone(),
        })
    }
}

fn render(note: &Note) -> Result<String> {
    note.render().map_err(|e| StoreError::Malformed {
        slug: note.slug.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<NoteSummary>> {
        let summaries = self
            .files
            .iter()
            .filter_map(|item| match Self::parse(item.key(), item.value()) {
                Ok(stored) => Some(stored.summary()),
                Err(e) => {
                    warn!(slug = %item.key(), error = %e, "skipping unparseable note");
                    None
                }
            })
            .collect();
        Ok(summaries)
    }

    async fn read(&self, slug: &Slug) -> Result<StoredNote> {
        if self.failing_reads.contains(slug) {
            return Err(StoreError::Unavailable(format!("read of {slug} failed")));
        }
        let entry = self.files.get(slug).ok_or_else(|| StoreError::NotFound {
            slug: slug.to_string(),
        })?;
        Self::parse(slug, &entry)
    }

    async fn commit(
        &self,
        slug: &Slug,
        note: &Note,
        expected: &RevisionMarker,
        message: &str,
    ) -> Result<RevisionMarker> {
        if let Some(hook) = self.take_hook(slug) {
            hook(self);
        }

        let content = render(note)?;
        let mut entry = self.files.get_mut(slug).ok_or_else(|| StoreError::NotFound {
            slug: slug.to_string(),
        })?;
        if entry.revision != *expected {
            return Err(StoreError::VersionConflict {
                slug: slug.to_string(),
                expected: expected.to_string(),
            });
        }

        let revision = self.next_revision(slug, &content);
        entry.revision = revision.clone();
        entry.content = content;
        debug!(%slug, %revision, message, "memory commit");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use notepress_notes::{Frontmatter, NoteStatus};

    fn note(slug: &str, status: NoteStatus) -> Note {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Note {
            slug: Slug::new(slug).unwrap(),
            frontmatter: Frontmatter {
                title: slug.to_string(),
                subtitle: None,
                tags: Vec::new(),
                date: at,
                status,
                scheduled_for: (status == NoteStatus::Scheduled).then_some(at),
                stamp_publish_date: false,
                extra: Default::default(),
            },
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn commit_with_current_revision_succeeds() {
        let store = MemoryStore::new();
        let n = note("a", NoteStatus::Draft);
        let rev = store.insert(&n).unwrap();

        let new_rev = store.commit(&n.slug, &n, &rev, "edit").await.unwrap();
        assert_ne!(new_rev, rev);
        assert_eq!(store.revision(&n.slug), Some(new_rev));
    }

    #[tokio::test]
    async fn stale_commit_is_rejected_and_leaves_content() {
        let store = MemoryStore::new();
        let n = note("a", NoteStatus::Draft);
        let stale = store.insert(&n).unwrap();
        store.insert(&n).unwrap();
        let before = store.raw(&n.slug);

        let err = store.commit(&n.slug, &n, &stale, "edit").await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert_eq!(store.raw(&n.slug), before);
    }

    #[tokio::test]
    async fn identical_rewrites_still_get_fresh_revisions() {
        let store = MemoryStore::new();
        let n = note("a", NoteStatus::Draft);
        let first = store.insert(&n).unwrap();
        let second = store.insert(&n).unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.read(&Slug::new("nope").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_scheduled_filters_by_status_and_time() {
        let store = MemoryStore::new();
        store.insert(&note("due", NoteStatus::Scheduled)).unwrap();
        store.insert(&note("draft", NoteStatus::Draft)).unwrap();
        store.insert(&note("done", NoteStatus::Published)).unwrap();
        store.insert_raw(&Slug::new("broken").unwrap(), "no frontmatter here");

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let due = store.list_scheduled(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].slug.as_str(), "due");

        let early = store
            .list_scheduled(now - chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert!(early.is_empty());
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failing_reads_report_unavailable() {
        let store = MemoryStore::new();
        let n = note("a", NoteStatus::Scheduled);
        store.insert(&n).unwrap();
        store.fail_reads_for(&n.slug);
        let err = store.read(&n.slug).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn commit_hook_runs_before_revision_check() {
        let store = MemoryStore::new();
        let n = note("a", NoteStatus::Scheduled);
        let rev = store.insert(&n).unwrap();
        let admin_copy = n.clone();
        store.on_next_commit(&n.slug, move |s| {
            s.insert(&admin_copy).unwrap();
        });

        let err = store.commit(&n.slug, &n, &rev, "publish").await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // hook consumed; a retry against the fresh revision goes through
        let fresh = store.revision(&n.slug).unwrap();
        assert!(store.commit(&n.slug, &n, &fresh, "publish").await.is_ok());
    }
}
