use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanopyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. two rooms claiming one external location id.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CanopyResult<T> = Result<T, CanopyError>;
