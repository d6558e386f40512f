//! SQLite schema bootstrap

use fable_core::Result;
use rusqlite::Connection;

/// Schema for the page/section/block tables.
///
/// Booleans are stored as INTEGER 0/1, timestamps as millisecond
/// INTEGERs. Block content is serialized JSON in `content_json`.
pub const SCHEMA: &str = "
  CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
  );

  CREATE TABLE IF NOT EXISTS sections (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    collapsed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
  );

  CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    content_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
  );

  CREATE INDEX IF NOT EXISTS idx_sections_page_id ON sections(page_id);
  CREATE INDEX IF NOT EXISTS idx_blocks_section_id ON blocks(section_id);
";

/// Create the tables and indices if they do not exist yet
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
