//! `notepress-publisher`: the `scheduled → published` state machine.
//!
//! # Overview
//!
//! [`PublishService`] moves one note from `scheduled` to `published` with an
//! optimistic commit against the revision it read, re-reading and retrying a
//! bounded number of times when another writer got there first.
//!
//! [`PublishScheduler`] runs one stateless batch: list due notes, publish each
//! through the service, and report a per-note outcome. Nothing survives
//! between batches; a note left `scheduled` by an interrupted batch is picked
//! up again by the next one.
//!
//! | Outcome     | Meaning                                                 |
//! |-------------|---------------------------------------------------------|
//! | `published` | Committed as a new revision                             |
//! | `skipped`   | Vanished, already published, no longer scheduled or due |
//! | `failed`    | Store error or conflicts exhausted; retried next batch  |

pub mod error;
pub mod scheduler;
pub mod service;
pub mod types;

pub use error::{PublishError, Result};
pub use scheduler::PublishScheduler;
pub use service::PublishService;
pub use types::{BatchResult, NoteReport, PublishOptions, PublishOutcome, ReportOutcome, SkipReason};
