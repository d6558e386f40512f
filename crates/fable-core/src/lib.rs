//! Fable Core - Foundational types for the Fable worldbuilding editor
//!
//! This crate provides the core types that all other Fable crates depend on:
//! - `PageId`, `SectionId`, `BlockId` - Stable entity identifiers
//! - `Page`, `Section`, `Block` - Document records
//! - `BlockType` - Block content discriminators
//! - Error types and Result alias

mod error;
mod id;
mod types;

pub use error::{FableError, Result};
pub use id::{BlockId, PageId, SectionId};
pub use types::{now_millis, Block, BlockType, Page, Section};
