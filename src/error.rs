//! Error types for collections and subsets.

use crate::types::{CollectionId, ModelKey};
use thiserror::Error;

/// Main error type for collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Invalid model {key}: {reason}")]
    InvalidModel { key: ModelKey, reason: String },

    #[error("Model id is immutable: {0}")]
    ImmutableId(ModelKey),

    #[error("Invalid document format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subset {0} is detached from its parent")]
    Detached(CollectionId),
}

impl From<serde_json::Error> for CollectionError {
    fn from(e: serde_json::Error) -> Self {
        CollectionError::Serialization(e.to_string())
    }
}

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;
