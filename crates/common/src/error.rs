//! Error types for frontcheck database verification

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading verification data
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query returned no rows: {0}")]
    NoRows(String),
}
