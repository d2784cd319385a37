//! Errors raised by the YAML store.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Failures reading or writing a persisted document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document exists but could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The document could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The document, or one of its sections, is not valid for the requested
    /// type.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A value could not be converted to YAML.
    #[error("failed to serialise data for '{path}': {source}")]
    Serialize {
        /// Document path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}
