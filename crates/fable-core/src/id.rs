//! Stable entity identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::FableError;

/// A stable identifier for a page.
///
/// Identifiers persist across save/load cycles and undo/redo restoration;
/// a restored entity keeps the id it was created with.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

/// A stable identifier for a section.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub Uuid);

/// A stable identifier for a block.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub Uuid);

impl PageId {
    /// Create a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an identifier from a raw UUID (for deserialization/testing)
    pub fn from_raw(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the raw UUID value
    pub fn raw(&self) -> Uuid {
        self.0
    }

    /// True for the all-zero UUID, which no minted id ever carries
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl SectionId {
    /// Create a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an identifier from a raw UUID (for deserialization/testing)
    pub fn from_raw(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the raw UUID value
    pub fn raw(&self) -> Uuid {
        self.0
    }
}

impl BlockId {
    /// Create a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an identifier from a raw UUID (for deserialization/testing)
    pub fn from_raw(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the raw UUID value
    pub fn raw(&self) -> Uuid {
        self.0
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

impl fmt::Debug for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionId({})", self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageId {
    type Err = FableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FableError::InvalidId(s.to_string()))
    }
}

impl FromStr for SectionId {
    type Err = FableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FableError::InvalidId(s.to_string()))
    }
}

impl FromStr for BlockId {
    type Err = FableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FableError::InvalidId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let id1 = PageId::new();
        let id2 = PageId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn test_from_raw_round_trip() {
        let raw = Uuid::new_v4();
        let id = SectionId::from_raw(raw);
        assert_eq!(id.raw(), raw);
        assert_eq!(id, raw.to_string().parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<BlockId>().is_err());
    }

    #[test]
    fn test_nil_detection() {
        assert!(PageId::from_raw(Uuid::nil()).is_nil());
    }
}
