//! Custom error types for llm-batch.
//!
//! Errors are split by how far they propagate: configuration errors abort the
//! run, collection errors skip one input file, and item errors only mark a
//! single record as failed.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running a batch.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Failed to read the configuration or template file.
    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse config file '{path}': {source}")]
    ConfigParse {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read an input collection or scan the data directory.
    #[error("failed to read input '{path}': {source}")]
    InputRead {
        /// Path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An input collection is not valid JSON.
    #[error("failed to parse collection '{path}': {source}")]
    CollectionParse {
        /// Path to the collection.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// An input collection parsed but does not hold an array of objects.
    #[error("malformed collection '{path}': {message}")]
    MalformedCollection {
        /// Path to the collection.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Failed to write a result artifact.
    #[error("failed to write output file '{path}': {source}")]
    OutputWrite {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize JSON for output.
    #[error("failed to serialize JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// Failed to build the HTTP client.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// An item pipeline exceeded the configured timeout.
    #[error("item {index} timed out after {elapsed:?}")]
    ItemTimeout {
        /// Global index of the item.
        index: usize,
        /// The timeout that elapsed.
        elapsed: Duration,
    },

    /// The gateway reported a transport failure and such failures are
    /// configured to fail the item.
    #[error("item {index} gateway failure: {message}")]
    GatewayFailure {
        /// Global index of the item.
        index: usize,
        /// Diagnostic text returned by the gateway.
        message: String,
    },
}

/// Result type alias for llm-batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
