//! Error types for the Kiosk library.
//!
//! Every failure a search or an ingestion run can hit is represented by the
//! [`KioskError`] enum. Errors raised while answering a query can also be
//! attributed to a [`SearchStage`], which is what the HTTP layer reports.
//!
//! # Examples
//!
//! ```
//! use kiosk::error::{KioskError, Result, SearchStage};
//!
//! fn lookup() -> Result<()> {
//!     Err(KioskError::index(SearchStage::VectorIndex, "connection refused"))
//! }
//!
//! let err = lookup().unwrap_err();
//! assert_eq!(err.stage(), SearchStage::VectorIndex);
//! assert!(!err.is_client_error());
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationError;

/// The stage of the search pipeline an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    /// Query validation.
    Validate,
    /// Query embedding.
    Embed,
    /// Dense similarity lookup.
    VectorIndex,
    /// Lexical lookup.
    KeywordIndex,
    /// Score fusion and the product join.
    Fusion,
    /// Anything outside a search request (ingestion, startup).
    Other,
}

impl SearchStage {
    /// Stable lowercase name used in logs and error bodies.
    pub fn name(&self) -> &'static str {
        match self {
            SearchStage::Validate => "validation",
            SearchStage::Embed => "embedding",
            SearchStage::VectorIndex => "vector_index",
            SearchStage::KeywordIndex => "keyword_index",
            SearchStage::Fusion => "fusion",
            SearchStage::Other => "internal",
        }
    }
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The main error type for Kiosk operations.
#[derive(Error, Debug)]
pub enum KioskError {
    /// Malformed or missing query.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Embedding provider failures (unreachable, quota, malformed response).
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        /// Whether a single retry may succeed.
        transient: bool,
    },

    /// Vector dimensionality differs between the provider and the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector or keyword store failures.
    #[error("Index error ({stage}): {message}")]
    Index { stage: SearchStage, message: String },

    /// An index returned an id with no product record behind it.
    #[error("Fusion error: product {id} is indexed but missing from the catalog")]
    Fusion { id: String },

    /// An external call exceeded its time budget.
    #[error("Timeout in {stage} after {millis} ms")]
    Timeout { stage: SearchStage, millis: u64 },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Product store failures outside of a search.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors (seed files, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with KioskError.
pub type Result<T> = std::result::Result<T, KioskError>;

impl KioskError {
    /// Create a new non-retryable embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        KioskError::Embedding {
            message: msg.into(),
            transient: false,
        }
    }

    /// Create a new embedding error that is worth one retry.
    pub fn transient_embedding<S: Into<String>>(msg: S) -> Self {
        KioskError::Embedding {
            message: msg.into(),
            transient: true,
        }
    }

    /// Create a new index error attributed to a stage.
    pub fn index<S: Into<String>>(stage: SearchStage, msg: S) -> Self {
        KioskError::Index {
            stage,
            message: msg.into(),
        }
    }

    /// Create a new fusion (ingestion/search desync) error.
    pub fn fusion<S: Into<String>>(id: S) -> Self {
        KioskError::Fusion { id: id.into() }
    }

    /// Create a new timeout error.
    pub fn timeout(stage: SearchStage, millis: u64) -> Self {
        KioskError::Timeout { stage, millis }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        KioskError::Config(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        KioskError::Storage(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        KioskError::Other(msg.into())
    }

    /// The pipeline stage this error is attributed to.
    pub fn stage(&self) -> SearchStage {
        match self {
            KioskError::Validation(_) => SearchStage::Validate,
            KioskError::Embedding { .. } | KioskError::DimensionMismatch { .. } => {
                SearchStage::Embed
            }
            KioskError::Index { stage, .. } | KioskError::Timeout { stage, .. } => *stage,
            KioskError::Fusion { .. } => SearchStage::Fusion,
            _ => SearchStage::Other,
        }
    }

    /// Whether the caller is at fault (4xx) rather than the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, KioskError::Validation(_))
    }

    /// Whether one local retry of the failed call is allowed.
    ///
    /// Dimension mismatches are configuration errors and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            KioskError::Embedding { transient, .. } => *transient,
            KioskError::Timeout { .. } => true,
            _ => false,
        }
    }
}
