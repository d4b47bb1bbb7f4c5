//! Error types for the venue domain

use thiserror::Error;

/// Result type alias for venue operations
pub type Result<T> = std::result::Result<T, VenueError>;

/// Main error type shared by the venue crates
#[derive(Error, Debug)]
pub enum VenueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
