//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Column not found: {column} (available: {available})")]
    ColumnNotFound { column: String, available: String },

    #[error("Row not found: no row with {column} = {key:?}")]
    RowNotFound { column: String, key: String },

    #[error("Duplicate key: {count} rows with {column} = {key:?}")]
    DuplicateKey { column: String, key: String, count: usize },

    #[error("WebDriver error: {code} - {message}")]
    WebDriver { code: String, message: String },

    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver not ready after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("API error {code}: {message} {data}")]
    Api { code: i64, message: String, data: String },

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error(transparent)]
    Database(#[from] frontcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Failures that mean the application did something unexpected, as
    /// opposed to harness or infrastructure problems.
    pub fn is_expectation_failure(&self) -> bool {
        matches!(
            self,
            E2eError::Assertion(_)
                | E2eError::Timeout(_)
                | E2eError::Authentication(_)
                | E2eError::ElementNotFound(_)
                | E2eError::ColumnNotFound { .. }
                | E2eError::RowNotFound { .. }
                | E2eError::DuplicateKey { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
