//! Error types for notes-core

use thiserror::Error;

/// Result type alias using notes-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the note store or change feed
#[derive(Error, Debug)]
pub enum Error {
    /// No signed-in user for an operation that needs one
    #[error("Not signed in")]
    Unauthenticated,

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store rejected the request
    #[error("Store error: {0}")]
    Store(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Change feed error
    #[error("Change feed error: {0}")]
    Feed(String),
}
