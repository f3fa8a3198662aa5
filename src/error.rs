use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("closed: {0}")]
    Closed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Wrap an engine error without reinterpreting it.
pub(crate) fn storage_err(e: impl std::fmt::Display) -> DbError {
    DbError::Storage(e.to_string())
}
