//! Error types for singlefile-pack

use thiserror::Error;

/// Result type for bundling operations
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors that can occur while acquiring, bundling or deploying
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Repository identifier is not `owner/repo`
    #[error("Invalid repository identifier: {0}")]
    InvalidRepository(String),

    /// Uploaded input could not be interpreted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Archive container could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// No usable text assets were found
    #[error("No usable text assets found in the project")]
    EmptyBundle,

    /// Every acquisition attempt failed
    #[error("Failed to acquire {target}: {}", failures.join("; "))]
    Acquisition {
        /// What was being fetched
        target: String,
        /// One message per failed attempt, in attempt order
        failures: Vec<String>,
    },

    /// A single fetch attempt failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Artifact exceeds the deploy size ceiling
    #[error("Artifact is {size} bytes, exceeding the {limit} byte limit")]
    SizeExceeded {
        /// Artifact size in bytes
        size: usize,
        /// Configured ceiling in bytes
        limit: usize,
    },

    /// Deploy collaborator reported a failure
    #[error("Deploy failed: {0}")]
    Deploy(String),
}

