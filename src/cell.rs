use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a cell (sortable, timestamp-based, never reused)
pub type CellId = Ulid;

/// A cell in the notebook, representing a single unit of content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cell<T> {
    /// Unique identifier, independent of position
    pub id: CellId,

    /// Cell content determines which editor handles it
    pub content: CellContent<T>,
}

impl<T> Cell<T> {
    /// Create a new cell with a fresh ID
    pub fn new(content: CellContent<T>) -> Self {
        Self {
            id: Ulid::new(),
            content,
        }
    }

    /// Create a new cell with a specific ID (useful for testing)
    pub fn with_id(id: CellId, content: CellContent<T>) -> Self {
        Self { id, content }
    }

    /// Create an empty placeholder cell awaiting a type decision
    pub fn stem() -> Self {
        Self::new(CellContent::Stem)
    }

    /// Create an empty rich-text cell
    pub fn rich_text() -> Self {
        Self::new(CellContent::RichText(String::new()))
    }

    /// Create a formal cell holding typed content
    pub fn formal(content: T) -> Self {
        Self::new(CellContent::Formal(content))
    }

    pub fn kind(&self) -> CellKind {
        self.content.kind()
    }

    pub fn is_stem(&self) -> bool {
        matches!(self.content, CellContent::Stem)
    }
}

/// Content of a cell, one variant per editing discipline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tag", content = "content", rename_all = "kebab-case")]
pub enum CellContent<T> {
    /// Placeholder with no content
    Stem,

    /// Free-form text, edited by the rich-text editor through the document path
    RichText(String),

    /// Typed content, edited by a caller-supplied editor
    Formal(T),
}

impl<T> CellContent<T> {
    pub fn kind(&self) -> CellKind {
        match self {
            CellContent::Stem => CellKind::Stem,
            CellContent::RichText(_) => CellKind::RichText,
            CellContent::Formal(_) => CellKind::Formal,
        }
    }

    /// Get the formal content, if any
    pub fn as_formal(&self) -> Option<&T> {
        match self {
            CellContent::Formal(content) => Some(content),
            _ => None,
        }
    }

    /// Get the rich text, if any
    pub fn as_rich_text(&self) -> Option<&str> {
        match self {
            CellContent::RichText(text) => Some(text),
            _ => None,
        }
    }
}

/// Tag of a cell, without its content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CellKind {
    Stem,
    RichText,
    Formal,
}
