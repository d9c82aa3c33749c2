//! `notepress-core`: configuration and the top-level error type shared by
//! every notepress crate.

pub mod config;
pub mod error;

pub use config::NotepressConfig;
pub use error::{NotepressError, Result};
