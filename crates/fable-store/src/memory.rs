//! In-memory `PageStore` for tests and previews

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fable_core::{Block, PageId, Result, Section};

use crate::store::{PageContents, PageStore};

/// A `PageStore` holding page contents in a map, with the same
/// ordering semantics as the SQLite store
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: Mutex<HashMap<PageId, PageContents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn load_page(&self, page_id: PageId) -> Result<PageContents> {
        let pages = self.pages.lock().unwrap();
        let mut contents = pages.get(&page_id).cloned().unwrap_or_default();

        contents.sections.sort_by_key(|s| s.order_index);
        let section_rank: HashMap<_, _> = contents
            .sections
            .iter()
            .enumerate()
            .map(|(rank, s)| (s.id, rank))
            .collect();
        contents
            .blocks
            .sort_by_key(|b| (section_rank.get(&b.section_id).copied(), b.order_index));

        Ok(contents)
    }

    async fn replace_page(
        &self,
        page_id: PageId,
        sections: &[Section],
        blocks: &[Block],
    ) -> Result<()> {
        let mut pages = self.pages.lock().unwrap();
        pages.insert(
            page_id,
            PageContents {
                sections: sections.to_vec(),
                blocks: blocks.to_vec(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fable_core::BlockType;
    use serde_json::json;

    #[tokio::test]
    async fn test_starts_empty() {
        let store = MemoryStore::new();
        let contents = store.load_page(PageId::new()).await.unwrap();
        assert!(contents.sections.is_empty());
        assert!(contents.blocks.is_empty());
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_contents() {
        let store = MemoryStore::new();
        let page = PageId::new();
        let first = Section::new(page, "First", 0);
        let second = Section::new(page, "Second", 0);

        store.replace_page(page, &[first], &[]).await.unwrap();
        store
            .replace_page(page, &[second.clone()], &[])
            .await
            .unwrap();

        let contents = store.load_page(page).await.unwrap();
        assert_eq!(contents.sections, vec![second]);
    }

    #[tokio::test]
    async fn test_load_orders_like_sqlite() {
        let store = MemoryStore::new();
        let page = PageId::new();
        let s0 = Section::new(page, "First", 0);
        let s1 = Section::new(page, "Second", 1);

        let b_late = Block::new(s1.id, BlockType::Paragraph, json!({}), 0);
        let b_second = Block::new(s0.id, BlockType::Paragraph, json!({}), 1);
        let b_first = Block::new(s0.id, BlockType::Paragraph, json!({}), 0);

        store
            .replace_page(
                page,
                &[s1.clone(), s0.clone()],
                &[b_late.clone(), b_second.clone(), b_first.clone()],
            )
            .await
            .unwrap();

        let contents = store.load_page(page).await.unwrap();
        let sections: Vec<_> = contents.sections.iter().map(|s| s.id).collect();
        assert_eq!(sections, vec![s0.id, s1.id]);
        let blocks: Vec<_> = contents.blocks.iter().map(|b| b.id).collect();
        assert_eq!(blocks, vec![b_first.id, b_second.id, b_late.id]);
    }
}
