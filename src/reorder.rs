//! Drag-to-reorder for notebook cells.
//!
//! A drop names a source cell, a target cell and the target edge closest to
//! the pointer. Both IDs are resolved to indices against the current
//! notebook at drop time; if either cell has disappeared the drop is a no-op.

use crate::{
    parse_cell_drag_data, CellId, Commit, DropEvent, NotebookError, ReplicatedDocument,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Edge of the drop target nearest the pointer, along the notebook axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosestEdge {
    /// Leading (top) edge
    Before,
    /// Trailing (bottom) edge
    After,
}

/// Index at which the moved cell ends up, after its own removal.
///
/// Without an edge the cell takes the target's index.
pub fn reorder_destination(source: usize, target: usize, edge: Option<ClosestEdge>) -> usize {
    if source == target {
        return source;
    }
    let Some(edge) = edge else {
        return target;
    };

    let going_after = edge == ClosestEdge::After;
    if source < target {
        if going_after {
            target
        } else {
            target - 1
        }
    } else if going_after {
        target + 1
    } else {
        target
    }
}

/// A cell reorder request decoded from a drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reorder {
    pub source: CellId,
    pub target: CellId,
    pub edge: Option<ClosestEdge>,
}

impl Reorder {
    /// Decode a drop of one notebook cell onto another.
    ///
    /// Returns `None` if either payload is not a notebook cell or the drop
    /// landed outside any target.
    pub fn from_drop(event: &DropEvent) -> Option<Self> {
        let source = parse_cell_drag_data(&event.source)?;
        let target = event.target.as_ref()?;
        Some(Self {
            source,
            target: parse_cell_drag_data(&target.data)?,
            edge: target.closest_edge,
        })
    }

    /// Apply the move as one transaction.
    ///
    /// Returns `Ok(None)` when a cell ID is stale.
    pub fn apply<T, D>(&self, doc: &mut D) -> Result<Option<Commit>, NotebookError>
    where
        T: Clone,
        D: ReplicatedDocument<T>,
    {
        let notebook = doc.notebook();
        let (Some(source_index), Some(target_index)) =
            (notebook.position(self.source), notebook.position(self.target))
        else {
            debug!(source = %self.source, target = %self.target, "ignoring drop of stale cell");
            return Ok(None);
        };

        let destination = reorder_destination(source_index, target_index, self.edge);
        if destination == source_index {
            return Ok(None);
        }

        let commit = doc.mutate(|txn| txn.move_cell(source_index, destination))?;
        Ok(Some(commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cell_drag_data, Cell, DragData, DropTarget, LocalDocument, Notebook};
    use pretty_assertions::assert_eq;

    fn document(n: u32) -> LocalDocument<u32> {
        LocalDocument::with_notebook(Notebook::from_cells((0..n).map(Cell::formal).collect()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_destination_rule() {
        use ClosestEdge::{After, Before};

        // moving forward
        assert_eq!(reorder_destination(0, 2, Some(Before)), 1);
        assert_eq!(reorder_destination(0, 2, Some(After)), 2);
        // moving backward
        assert_eq!(reorder_destination(3, 1, Some(Before)), 1);
        assert_eq!(reorder_destination(3, 1, Some(After)), 2);
        // onto itself or without an edge
        assert_eq!(reorder_destination(2, 2, Some(After)), 2);
        assert_eq!(reorder_destination(0, 3, None), 3);
    }

    #[test]
    fn test_adjacent_drop_is_noop() {
        let mut doc = document(3);
        let ids = doc.notebook().ids();
        let reorder = Reorder {
            source: ids[0],
            target: ids[1],
            edge: Some(ClosestEdge::Before),
        };

        assert_eq!(reorder.apply(&mut doc).unwrap(), None);
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_apply_moves_cell() {
        let mut doc = document(4);
        let ids = doc.notebook().ids();
        let reorder = Reorder {
            source: ids[3],
            target: ids[0],
            edge: Some(ClosestEdge::Before),
        };

        let commit = reorder.apply(&mut doc).unwrap().unwrap();
        assert_eq!(commit.changes, 1);
        assert_eq!(doc.notebook().ids(), vec![ids[3], ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn test_stale_ids_are_ignored() {
        let mut doc = document(2);
        let ids = doc.notebook().ids();
        let reorder = Reorder {
            source: ulid::Ulid::new(),
            target: ids[0],
            edge: Some(ClosestEdge::After),
        };

        assert_eq!(reorder.apply(&mut doc).unwrap(), None);
        assert_eq!(doc.notebook().ids(), ids);
    }

    #[test]
    fn test_from_drop() {
        let (a, b) = (ulid::Ulid::new(), ulid::Ulid::new());
        let event = DropEvent {
            source: cell_drag_data(a),
            target: Some(DropTarget {
                data: cell_drag_data(b),
                closest_edge: Some(ClosestEdge::After),
            }),
        };
        assert_eq!(
            Reorder::from_drop(&event),
            Some(Reorder {
                source: a,
                target: b,
                edge: Some(ClosestEdge::After)
            })
        );

        let outside = DropEvent {
            source: cell_drag_data(a),
            target: None,
        };
        assert_eq!(Reorder::from_drop(&outside), None);

        let foreign = DropEvent {
            source: DragData::new(),
            target: event.target.clone(),
        };
        assert_eq!(Reorder::from_drop(&foreign), None);
    }
}
