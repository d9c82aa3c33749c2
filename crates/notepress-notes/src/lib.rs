//! `notepress-notes`: the note entity (slug, frontmatter and body).
//!
//! A note file on disk (or in the remote repository) looks like:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [intro]
//! date: 2024-03-01T00:00:00Z
//! status: scheduled
//! scheduledFor: 2024-03-01T00:00:00Z
//! ---
//!
//! Markdown body.
//! ```
//!
//! Lifecycle is `draft → scheduled → published`. The only automated
//! transition is [`Frontmatter::into_published`].

pub mod error;
pub mod note;
pub mod slug;
pub mod types;

pub use error::{NoteError, Result};
pub use note::Note;
pub use slug::Slug;
pub use types::{Frontmatter, NoteStatus};
