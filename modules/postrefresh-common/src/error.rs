use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Whitelist error: {0}")]
    Whitelist(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for refresh operations.
pub type RefreshResult<T> = std::result::Result<T, RefreshError>;
