//! Fable Store - SQLite persistence for pages, sections and blocks
//!
//! This crate owns the durable representation of the editor's documents:
//! - `SqliteStore` - the production store with full CRUD per entity
//! - `PageStore` - the narrow trait the history controller restores through
//! - `MemoryStore` - an in-memory stand-in for tests
//!
//! `PageStore::replace_page` is the transactional delete-then-reinsert
//! used to synchronize a page with a history snapshot.

mod memory;
mod schema;
mod store;

pub use memory::MemoryStore;
pub use schema::{init_schema, SCHEMA};
pub use store::{PageContents, PageStore, SqliteStore};
