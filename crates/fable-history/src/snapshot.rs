//! Full-page state snapshots

use fable_core::{now_millis, Block, PageId, Result, Section};
use fable_store::PageStore;

/// An immutable full copy of one page's sections and blocks at a point
/// in time.
///
/// Snapshots are self-contained: they own their rows, so later edits to
/// the live document never alter a snapshot already on a stack. The
/// capture time is diagnostic only; stack position defines history
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub page_id: PageId,
    pub sections: Vec<Section>,
    pub blocks: Vec<Block>,
    pub captured_at: i64,
}

impl Snapshot {
    /// Build a snapshot from already-loaded rows
    pub fn from_parts(page_id: PageId, sections: Vec<Section>, blocks: Vec<Block>) -> Self {
        Self {
            page_id,
            sections,
            blocks,
            captured_at: now_millis(),
        }
    }

    /// Capture the page's current persisted state.
    ///
    /// Callers invoke this after every committed mutation, so the
    /// snapshot records the state the mutation produced.
    pub async fn capture(store: &dyn PageStore, page_id: PageId) -> Result<Self> {
        let contents = store.load_page(page_id).await?;
        Ok(Self::from_parts(page_id, contents.sections, contents.blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fable_core::BlockType;
    use fable_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_capture_copies_current_state() {
        let store = MemoryStore::new();
        let page = PageId::new();
        let section = Section::new(page, "Basics", 0);
        let block = Block::new(section.id, BlockType::Paragraph, json!({}), 0);
        store
            .replace_page(page, &[section.clone()], &[block.clone()])
            .await
            .unwrap();

        let snapshot = Snapshot::capture(&store, page).await.unwrap();
        assert_eq!(snapshot.page_id, page);
        assert_eq!(snapshot.sections, vec![section]);
        assert_eq!(snapshot.blocks, vec![block]);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let store = MemoryStore::new();
        let page = PageId::new();
        let section = Section::new(page, "Before", 0);
        store
            .replace_page(page, &[section.clone()], &[])
            .await
            .unwrap();

        let snapshot = Snapshot::capture(&store, page).await.unwrap();

        let mut renamed = section.clone();
        renamed.title = "After".to_string();
        store.replace_page(page, &[renamed], &[]).await.unwrap();

        assert_eq!(snapshot.sections[0].title, "Before");
    }
}
