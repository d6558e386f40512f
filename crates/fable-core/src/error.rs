//! Error types for Fable

use thiserror::Error;

use crate::id::{BlockId, PageId, SectionId};

/// The main error type for Fable operations
#[derive(Debug, Error)]
pub enum FableError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Snapshot page mismatch: bound to {expected}, got {got}")]
    PageMismatch { expected: PageId, got: PageId },

    #[error("Cannot apply snapshot without a page id")]
    MissingPageId,

    #[error("Invalid block type: {0}")]
    InvalidBlockType(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Fable operations
pub type Result<T> = std::result::Result<T, FableError>;
