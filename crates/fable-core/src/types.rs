//! Document records for the page/section/block editor

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::FableError;
use crate::id::{BlockId, PageId, SectionId};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// All `created_at`/`updated_at` fields use this resolution.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A page of the power-system editor, the scoping unit for history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Page {
    /// Create a new page with fresh timestamps
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: PageId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An ordered container of blocks, belonging to exactly one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub page_id: PageId,
    pub title: String,
    /// Zero-based position among the page's sections
    pub order_index: i64,
    pub collapsed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Section {
    /// Create a new section with fresh timestamps
    pub fn new(page_id: PageId, title: impl Into<String>, order_index: i64) -> Self {
        let now = now_millis();
        Self {
            id: SectionId::new(),
            page_id,
            title: title.into(),
            order_index,
            collapsed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A typed content unit belonging to exactly one section.
///
/// The content payload is opaque JSON; each `BlockType` defines its own
/// shape, interpreted by the rendering layer, not by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub section_id: SectionId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Zero-based position among the section's blocks
    pub order_index: i64,
    pub content: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Block {
    /// Create a new block with fresh timestamps
    pub fn new(
        section_id: SectionId,
        block_type: BlockType,
        content: Value,
        order_index: i64,
    ) -> Self {
        let now = now_millis();
        Self {
            id: BlockId::new(),
            section_id,
            block_type,
            order_index,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Block content discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Paragraph,
    Image,
    Informative,
    Stars,
    Dropdown,
    Icon,
    IconGroup,
    NumberedList,
    Navigator,
    Attributes,
}

impl BlockType {
    /// The string form stored in the `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::Image => "image",
            BlockType::Informative => "informative",
            BlockType::Stars => "stars",
            BlockType::Dropdown => "dropdown",
            BlockType::Icon => "icon",
            BlockType::IconGroup => "icon-group",
            BlockType::NumberedList => "numbered-list",
            BlockType::Navigator => "navigator",
            BlockType::Attributes => "attributes",
        }
    }
}

impl FromStr for BlockType {
    type Err = FableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paragraph" => Ok(BlockType::Paragraph),
            "image" => Ok(BlockType::Image),
            "informative" => Ok(BlockType::Informative),
            "stars" => Ok(BlockType::Stars),
            "dropdown" => Ok(BlockType::Dropdown),
            "icon" => Ok(BlockType::Icon),
            "icon-group" => Ok(BlockType::IconGroup),
            "numbered-list" => Ok(BlockType::NumberedList),
            "navigator" => Ok(BlockType::Navigator),
            "attributes" => Ok(BlockType::Attributes),
            other => Err(FableError::InvalidBlockType(other.to_string())),
        }
    }
}
