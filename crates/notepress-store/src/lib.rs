//! `notepress-store`: revision-addressed access to note files.
//!
//! The remote repository is treated as a key-value store where every write
//! names the revision it was built on. A write against a stale revision is
//! rejected with [`StoreError::VersionConflict`] instead of overwriting
//! whatever landed in between.
//!
//! Backends:
//!
//! | Backend          | Revision marker                    |
//! |------------------|------------------------------------|
//! | [`GitHubStore`]  | git blob SHA of the file           |
//! | [`MemoryStore`]  | SHA-256 over slug, generation, body |

pub mod error;
pub mod github;
pub mod memory;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use github::GitHubStore;
pub use memory::MemoryStore;
pub use store::{bounded, ContentStore};
pub use types::{NoteSummary, RevisionMarker, StoredNote};
