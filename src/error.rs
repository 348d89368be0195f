//! Error types for notebook editing

use crate::CellId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotebookError {
    #[error("Index {index} out of bounds for notebook of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Cell ID already present in notebook: {0}")]
    DuplicateCellId(CellId),

    #[error("Cell not found: {0}")]
    CellNotFound(CellId),

    #[error("Cell is not a formal cell: {0}")]
    NotFormal(CellId),

    #[error("Cell is not a rich-text cell: {0}")]
    NotRichText(CellId),

    /// Failure raised by the transaction body or the document substrate
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Encoding, decoding or merging a replica update failed
    #[error("Sync failed: {0}")]
    Sync(String),
}
