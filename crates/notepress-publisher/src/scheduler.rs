use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::service::PublishService;
use crate::types::{BatchResult, NoteReport, ReportOutcome};

/// Upper bound on notes published concurrently within one batch.
pub const MAX_CONCURRENCY: usize = 4;

/// Runs one scan-and-publish pass over every due note.
///
/// Stateless between runs: the caller supplies `now`, the store supplies the
/// candidates, and nothing is remembered afterwards.
pub struct PublishScheduler {
    service: Arc<PublishService>,
    concurrency: usize,
}

impl PublishScheduler {
    /// `concurrency` is clamped to `1..=MAX_CONCURRENCY`.
    pub fn new(service: Arc<PublishService>, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
        }
    }

    /// List due notes and publish each of them.
    ///
    /// Per-note failures end up in the report and never stop the batch. Only a
    /// failure to produce the candidate list is returned as an error.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BatchResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("publish_batch", %run_id);
        self.run_batch(run_id, now).instrument(span).await
    }

    async fn run_batch(&self, run_id: Uuid, now: DateTime<Utc>) -> Result<BatchResult> {
        let candidates = self.service.candidates(now).await.map_err(|e| {
            error!(error = %e, "listing scheduled notes failed");
            e
        })?;
        info!(candidates = candidates.len(), %now, "publish batch started");

        let service = &self.service;
        let mut results: Vec<NoteReport> = stream::iter(candidates)
            .map(|candidate| async move {
                let result = service.publish(&candidate.slug, now).await;
                if let Err(ref e) = result {
                    error!(slug = %candidate.slug, error = %e, "publish failed");
                }
                NoteReport {
                    slug: candidate.slug,
                    title: candidate.frontmatter.title,
                    outcome: ReportOutcome::from(result),
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.slug.cmp(&b.slug));

        let batch = BatchResult {
            run_id,
            now,
            processed: results.len(),
            results,
        };
        info!(
            processed = batch.processed,
            published = batch.published_count(),
            skipped = batch.skipped_count(),
            failed = batch.failed_count(),
            "publish batch finished"
        );
        Ok(batch)
    }
}
