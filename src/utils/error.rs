use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from I/O operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from backend RPC calls
    #[error("Backend RPC error: {0}")]
    RpcError(#[from] reqwest::Error),

    /// Error committing the configuration store
    #[error("Config store error: {0}")]
    StoreError(String),

    /// Referenced config section does not exist
    #[error("Unknown config section: {0}")]
    UnknownSection(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;
