use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotepressError {
    /// The config file or environment could not be turned into a usable config.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NotepressError>;
