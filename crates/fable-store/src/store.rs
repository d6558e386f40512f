//! SQLite-backed page storage

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use fable_core::{
    now_millis, Block, BlockId, BlockType, FableError, Page, PageId, Result, Section, SectionId,
};
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::debug;

use crate::schema::init_schema;

/// The sections and blocks of one page, in display order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContents {
    pub sections: Vec<Section>,
    pub blocks: Vec<Block>,
}

/// Storage collaborator consumed by the history controller.
///
/// `replace_page` must be atomic: either all of the page's rows are
/// replaced by the given ones, or none are.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Read a page's sections and blocks, ordered by `order_index`
    async fn load_page(&self, page_id: PageId) -> Result<PageContents>;

    /// Make the page's persisted rows exactly match the given sections
    /// and blocks, preserving their ids and timestamps
    async fn replace_page(
        &self,
        page_id: PageId,
        sections: &[Section],
        blocks: &[Block],
    ) -> Result<()>;
}

/// SQLite-backed store for pages, sections and blocks
///
/// The connection sits behind a mutex because `rusqlite::Connection`
/// is not `Sync`; every call locks it for the duration of its
/// statements.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a transient in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // --- Pages ---

    /// Create a new page
    pub fn create_page(&self, name: impl Into<String>) -> Result<Page> {
        let page = Page::new(name);
        self.conn().execute(
            "INSERT INTO pages (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                page.id.to_string(),
                page.name,
                page.created_at,
                page.updated_at
            ],
        )?;
        Ok(page)
    }

    /// Fetch a page by id
    pub fn page(&self, page_id: PageId) -> Result<Page> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at, updated_at FROM pages WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![page_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        match rows.next() {
            Some(row) => {
                let (id, name, created_at, updated_at) = row?;
                Ok(Page {
                    id: id.parse()?,
                    name,
                    created_at,
                    updated_at,
                })
            }
            None => Err(FableError::PageNotFound(page_id)),
        }
    }

    /// List all pages, oldest first
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM pages ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut pages = Vec::new();
        for row in rows {
            let (id, name, created_at, updated_at) = row?;
            pages.push(Page {
                id: id.parse()?,
                name,
                created_at,
                updated_at,
            });
        }
        Ok(pages)
    }

    /// Rename a page
    pub fn rename_page(&self, page_id: PageId, name: impl Into<String>) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE pages SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name.into(), now_millis(), page_id.to_string()],
        )?;
        if changed == 0 {
            return Err(FableError::PageNotFound(page_id));
        }
        Ok(())
    }

    /// Delete a page together with its sections and blocks
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        delete_page_rows(&tx, page_id)?;
        tx.execute(
            "DELETE FROM pages WHERE id = ?1",
            params![page_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Clone a page with fresh ids for the page, its sections and blocks.
    ///
    /// Order indices carry over; timestamps are regenerated since the
    /// copy is a new document, not a restoration.
    pub fn duplicate_page(&self, page_id: PageId) -> Result<Page> {
        let source = self.page(page_id)?;
        let contents = {
            let conn = self.conn();
            PageContents {
                sections: read_sections(&conn, page_id)?,
                blocks: read_blocks_by_page(&conn, page_id)?,
            }
        };

        let now = now_millis();
        let copy = Page {
            id: PageId::new(),
            name: format!("{} (copy)", source.name),
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO pages (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![copy.id.to_string(), copy.name, copy.created_at, copy.updated_at],
        )?;

        let mut section_ids = std::collections::HashMap::new();
        for section in &contents.sections {
            let new_id = SectionId::new();
            section_ids.insert(section.id, new_id);
            insert_section(
                &tx,
                &Section {
                    id: new_id,
                    page_id: copy.id,
                    title: section.title.clone(),
                    order_index: section.order_index,
                    collapsed: section.collapsed,
                    created_at: now,
                    updated_at: now,
                },
            )?;
        }
        for block in &contents.blocks {
            let section_id = section_ids
                .get(&block.section_id)
                .copied()
                .ok_or(FableError::SectionNotFound(block.section_id))?;
            insert_block(
                &tx,
                &Block {
                    id: BlockId::new(),
                    section_id,
                    block_type: block.block_type,
                    order_index: block.order_index,
                    content: block.content.clone(),
                    created_at: now,
                    updated_at: now,
                },
            )?;
        }
        tx.commit()?;
        Ok(copy)
    }

    // --- Sections ---

    /// Read a page's sections ordered by `order_index`
    pub fn sections_by_page(&self, page_id: PageId) -> Result<Vec<Section>> {
        read_sections(&self.conn(), page_id)
    }

    /// Create a section at the given order index
    pub fn create_section(
        &self,
        page_id: PageId,
        title: impl Into<String>,
        order_index: i64,
    ) -> Result<Section> {
        let section = Section::new(page_id, title, order_index);
        insert_section(&self.conn(), &section)?;
        Ok(section)
    }

    /// Change a section's title
    pub fn rename_section(&self, section_id: SectionId, title: impl Into<String>) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE sections SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title.into(), now_millis(), section_id.to_string()],
        )?;
        if changed == 0 {
            return Err(FableError::SectionNotFound(section_id));
        }
        Ok(())
    }

    /// Collapse or expand a section
    pub fn set_section_collapsed(&self, section_id: SectionId, collapsed: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE sections SET collapsed = ?1, updated_at = ?2 WHERE id = ?3",
            params![collapsed as i64, now_millis(), section_id.to_string()],
        )?;
        if changed == 0 {
            return Err(FableError::SectionNotFound(section_id));
        }
        Ok(())
    }

    /// Delete a section and every block it contains
    pub fn delete_section(&self, section_id: SectionId) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM blocks WHERE section_id = ?1",
            params![section_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM sections WHERE id = ?1",
            params![section_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Assign dense order indices from the position of each id in the list
    pub fn reorder_sections(&self, section_ids: &[SectionId]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (index, id) in section_ids.iter().enumerate() {
            tx.execute(
                "UPDATE sections SET order_index = ?1 WHERE id = ?2",
                params![index as i64, id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // --- Blocks ---

    /// Read a section's blocks ordered by `order_index`
    pub fn blocks_by_section(&self, section_id: SectionId) -> Result<Vec<Block>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, section_id, type, order_index, content_json, created_at, updated_at
             FROM blocks WHERE section_id = ?1 ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map(params![section_id.to_string()], block_row)?;
        collect_blocks(rows)
    }

    /// Read every block on a page, ordered by section then block position
    pub fn blocks_by_page(&self, page_id: PageId) -> Result<Vec<Block>> {
        read_blocks_by_page(&self.conn(), page_id)
    }

    /// Create a block at the given order index
    pub fn create_block(
        &self,
        section_id: SectionId,
        block_type: BlockType,
        content: Value,
        order_index: i64,
    ) -> Result<Block> {
        let block = Block::new(section_id, block_type, content, order_index);
        insert_block(&self.conn(), &block)?;
        Ok(block)
    }

    /// Replace a block's content payload
    pub fn update_block_content(&self, block_id: BlockId, content: Value) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE blocks SET content_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&content)?,
                now_millis(),
                block_id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(FableError::BlockNotFound(block_id));
        }
        Ok(())
    }

    /// Delete a block
    pub fn delete_block(&self, block_id: BlockId) -> Result<()> {
        self.conn().execute(
            "DELETE FROM blocks WHERE id = ?1",
            params![block_id.to_string()],
        )?;
        Ok(())
    }

    /// Assign dense order indices from the position of each id in the list
    pub fn reorder_blocks(&self, block_ids: &[BlockId]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (index, id) in block_ids.iter().enumerate() {
            tx.execute(
                "UPDATE blocks SET order_index = ?1 WHERE id = ?2",
                params![index as i64, id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_page_tx(
        &self,
        page_id: PageId,
        sections: &[Section],
        blocks: &[Block],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        delete_page_rows(&tx, page_id)?;
        for section in sections {
            insert_section(&tx, section)?;
        }
        for block in blocks {
            insert_block(&tx, block)?;
        }
        tx.commit()?;
        debug!(
            page = %page_id,
            sections = sections.len(),
            blocks = blocks.len(),
            "replaced page contents"
        );
        Ok(())
    }
}

#[async_trait]
impl PageStore for SqliteStore {
    async fn load_page(&self, page_id: PageId) -> Result<PageContents> {
        let conn = self.conn();
        Ok(PageContents {
            sections: read_sections(&conn, page_id)?,
            blocks: read_blocks_by_page(&conn, page_id)?,
        })
    }

    async fn replace_page(
        &self,
        page_id: PageId,
        sections: &[Section],
        blocks: &[Block],
    ) -> Result<()> {
        self.replace_page_tx(page_id, sections, blocks)
    }
}

/// Delete all of a page's blocks, then its sections
fn delete_page_rows(conn: &Connection, page_id: PageId) -> Result<()> {
    conn.execute(
        "DELETE FROM blocks WHERE section_id IN (SELECT id FROM sections WHERE page_id = ?1)",
        params![page_id.to_string()],
    )?;
    conn.execute(
        "DELETE FROM sections WHERE page_id = ?1",
        params![page_id.to_string()],
    )?;
    Ok(())
}

fn insert_section(conn: &Connection, section: &Section) -> Result<()> {
    conn.execute(
        "INSERT INTO sections (id, page_id, title, order_index, collapsed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            section.id.to_string(),
            section.page_id.to_string(),
            section.title,
            section.order_index,
            section.collapsed as i64,
            section.created_at,
            section.updated_at
        ],
    )?;
    Ok(())
}

fn insert_block(conn: &Connection, block: &Block) -> Result<()> {
    conn.execute(
        "INSERT INTO blocks (id, section_id, type, order_index, content_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            block.id.to_string(),
            block.section_id.to_string(),
            block.block_type.as_str(),
            block.order_index,
            serde_json::to_string(&block.content)?,
            block.created_at,
            block.updated_at
        ],
    )?;
    Ok(())
}

type SectionRow = (String, String, String, i64, i64, i64, i64);
type BlockRow = (String, String, String, i64, String, i64, i64);

fn read_sections(conn: &Connection, page_id: PageId) -> Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT id, page_id, title, order_index, collapsed, created_at, updated_at
         FROM sections WHERE page_id = ?1 ORDER BY order_index ASC",
    )?;
    let rows = stmt.query_map(params![page_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, i64>(6)?,
        ))
    })?;

    let mut sections = Vec::new();
    for row in rows {
        let (id, page, title, order_index, collapsed, created_at, updated_at): SectionRow = row?;
        sections.push(Section {
            id: id.parse()?,
            page_id: page.parse()?,
            title,
            order_index,
            collapsed: collapsed != 0,
            created_at,
            updated_at,
        });
    }
    Ok(sections)
}

fn read_blocks_by_page(conn: &Connection, page_id: PageId) -> Result<Vec<Block>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.section_id, b.type, b.order_index, b.content_json, b.created_at, b.updated_at
         FROM blocks b JOIN sections s ON b.section_id = s.id
         WHERE s.page_id = ?1 ORDER BY s.order_index ASC, b.order_index ASC",
    )?;
    let rows = stmt.query_map(params![page_id.to_string()], block_row)?;
    collect_blocks(rows)
}

fn block_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, i64>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, i64>(5)?,
        row.get::<_, i64>(6)?,
    ))
}

fn collect_blocks(
    rows: impl Iterator<Item = rusqlite::Result<BlockRow>>,
) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    for row in rows {
        let (id, section_id, block_type, order_index, content_json, created_at, updated_at) = row?;
        blocks.push(Block {
            id: id.parse()?,
            section_id: section_id.parse()?,
            block_type: block_type.parse()?,
            order_index,
            content: serde_json::from_str(&content_json)?,
            created_at,
            updated_at,
        });
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_page_crud() {
        let store = store();
        let page = store.create_page("Aether").unwrap();

        let fetched = store.page(page.id).unwrap();
        assert_eq!(fetched, page);

        store.rename_page(page.id, "Aether Arts").unwrap();
        assert_eq!(store.page(page.id).unwrap().name, "Aether Arts");

        store.delete_page(page.id).unwrap();
        assert!(matches!(
            store.page(page.id),
            Err(FableError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_rename_missing_page() {
        let store = store();
        assert!(matches!(
            store.rename_page(PageId::new(), "ghost"),
            Err(FableError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_section_crud_round_trip() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();

        let sections = store.sections_by_page(page.id).unwrap();
        assert_eq!(sections, vec![section.clone()]);

        store.rename_section(section.id, "Fundamentals").unwrap();
        store.set_section_collapsed(section.id, true).unwrap();
        let reloaded = &store.sections_by_page(page.id).unwrap()[0];
        assert_eq!(reloaded.title, "Fundamentals");
        assert!(reloaded.collapsed);

        store.delete_section(section.id).unwrap();
        assert!(store.sections_by_page(page.id).unwrap().is_empty());
    }

    #[test]
    fn test_block_content_survives_json_round_trip() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();
        let content = json!({
            "text": "Carved glyphs",
            "stars": 4,
            "tags": ["fire", "stone"],
        });
        let block = store
            .create_block(section.id, BlockType::Informative, content.clone(), 0)
            .unwrap();

        let blocks = store.blocks_by_section(section.id).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, content);
        assert_eq!(blocks[0].block_type, BlockType::Informative);

        store
            .update_block_content(block.id, json!({ "text": "Revised" }))
            .unwrap();
        let blocks = store.blocks_by_section(section.id).unwrap();
        assert_eq!(blocks[0].content, json!({ "text": "Revised" }));
    }

    #[test]
    fn test_reorder_assigns_dense_indices() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let a = store.create_section(page.id, "A", 0).unwrap();
        let b = store.create_section(page.id, "B", 1).unwrap();
        let c = store.create_section(page.id, "C", 2).unwrap();

        store.reorder_sections(&[c.id, a.id, b.id]).unwrap();
        let sections = store.sections_by_page(page.id).unwrap();
        let order: Vec<_> = sections.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
        let indices: Vec<_> = sections.iter().map(|s| s.order_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_delete_section_cascades_to_blocks() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();
        store
            .create_block(section.id, BlockType::Paragraph, json!({ "text": "x" }), 0)
            .unwrap();

        store.delete_section(section.id).unwrap();
        assert!(store.blocks_by_page(page.id).unwrap().is_empty());
    }

    #[test]
    fn test_blocks_by_page_orders_by_section_then_block() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let s0 = store.create_section(page.id, "First", 0).unwrap();
        let s1 = store.create_section(page.id, "Second", 1).unwrap();
        let b2 = store
            .create_block(s1.id, BlockType::Paragraph, json!({ "text": "c" }), 0)
            .unwrap();
        let b1 = store
            .create_block(s0.id, BlockType::Paragraph, json!({ "text": "b" }), 1)
            .unwrap();
        let b0 = store
            .create_block(s0.id, BlockType::Paragraph, json!({ "text": "a" }), 0)
            .unwrap();

        let blocks = store.blocks_by_page(page.id).unwrap();
        let order: Vec<_> = blocks.iter().map(|b| b.id).collect();
        assert_eq!(order, vec![b0.id, b1.id, b2.id]);
    }

    #[test]
    fn test_duplicate_page_clones_rows_with_fresh_ids() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();
        store
            .create_block(section.id, BlockType::Stars, json!({ "rating": 5 }), 0)
            .unwrap();

        let copy = store.duplicate_page(page.id).unwrap();
        assert_ne!(copy.id, page.id);
        assert_eq!(copy.name, "Runes (copy)");

        let sections = store.sections_by_page(copy.id).unwrap();
        assert_eq!(sections.len(), 1);
        assert_ne!(sections[0].id, section.id);
        assert_eq!(sections[0].title, "Basics");

        let blocks = store.blocks_by_page(copy.id).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].section_id, sections[0].id);
        assert_eq!(blocks[0].content, json!({ "rating": 5 }));

        // Source page untouched
        assert_eq!(store.sections_by_page(page.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_page_is_idempotent() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();
        let block = store
            .create_block(section.id, BlockType::Paragraph, json!({ "text": "x" }), 0)
            .unwrap();

        let sections = vec![section.clone()];
        let blocks = vec![block.clone()];
        store
            .replace_page(page.id, &sections, &blocks)
            .await
            .unwrap();
        let first = store.load_page(page.id).await.unwrap();
        store
            .replace_page(page.id, &sections, &blocks)
            .await
            .unwrap();
        let second = store.load_page(page.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.sections, sections);
        assert_eq!(first.blocks, blocks);
    }

    #[tokio::test]
    async fn test_replace_page_preserves_original_timestamps() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let mut section = store.create_section(page.id, "Basics", 0).unwrap();
        section.created_at = 1111;
        section.updated_at = 2222;

        store
            .replace_page(page.id, &[section.clone()], &[])
            .await
            .unwrap();
        let restored = &store.load_page(page.id).await.unwrap().sections[0];
        assert_eq!(restored.created_at, 1111);
        assert_eq!(restored.updated_at, 2222);
    }

    #[tokio::test]
    async fn test_replace_page_rolls_back_on_failure() {
        let store = store();
        let page = store.create_page("Runes").unwrap();
        let section = store.create_section(page.id, "Basics", 0).unwrap();

        // A duplicated section id violates the primary key mid-insert;
        // the prior rows must survive the failed replace.
        let dup = vec![section.clone(), section.clone()];
        let result = store.replace_page(page.id, &dup, &[]).await;
        assert!(result.is_err());

        let contents = store.load_page(page.id).await.unwrap();
        assert_eq!(contents.sections, vec![section]);
    }

    #[tokio::test]
    async fn test_replace_page_scopes_to_one_page() {
        let store = store();
        let page_a = store.create_page("A").unwrap();
        let page_b = store.create_page("B").unwrap();
        store.create_section(page_a.id, "On A", 0).unwrap();
        let section_b = store.create_section(page_b.id, "On B", 0).unwrap();

        store.replace_page(page_a.id, &[], &[]).await.unwrap();

        assert!(store.load_page(page_a.id).await.unwrap().sections.is_empty());
        assert_eq!(
            store.load_page(page_b.id).await.unwrap().sections,
            vec![section_b]
        );
    }
}
