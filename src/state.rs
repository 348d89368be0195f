use crate::{CellId, Notebook};
use std::collections::HashSet;

/// Ephemeral focus and selection state of one editing session.
///
/// The active cell is tracked by position and the selection by identity, so
/// a selection survives insertions and moves elsewhere in the notebook. This
/// state is never stored in or merged through the shared document.
#[derive(Debug, Clone, PartialEq)]
pub struct CellsState {
    active_cell: Option<usize>,
    selected_cells: HashSet<CellId>,

    /// Whether the notebook was empty at the last reconcile
    notebook_empty: bool,
}

impl Default for CellsState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// What a state transition changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub active_changed: bool,
    pub selection_changed: bool,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        !self.active_changed && !self.selection_changed
    }

    pub fn merge(self, other: Transition) -> Transition {
        Transition {
            active_changed: self.active_changed || other.active_changed,
            selection_changed: self.selection_changed || other.selection_changed,
        }
    }
}

impl CellsState {
    /// Initial state for a notebook of `len` cells
    pub fn new(len: usize) -> Self {
        Self {
            active_cell: if len > 0 { Some(0) } else { None },
            selected_cells: HashSet::new(),
            notebook_empty: len == 0,
        }
    }

    pub fn active_cell(&self) -> Option<usize> {
        self.active_cell
    }

    pub fn selected_cells(&self) -> &HashSet<CellId> {
        &self.selected_cells
    }

    /// Selection in a stable (sorted) order
    pub fn selected_sorted(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self.selected_cells.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_selected(&self, id: CellId) -> bool {
        self.selected_cells.contains(&id)
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active_cell == Some(index)
    }

    /// User navigated to `index`: moves focus and clears the selection
    pub fn set_active_cell(&mut self, index: Option<usize>) -> Transition {
        let active_changed = self.active_cell != index;
        self.active_cell = index;
        Transition {
            active_changed,
            selection_changed: self.clear_selection(),
        }
    }

    /// A child editor reported focus: moves focus, keeps the selection
    pub fn set_active_cell_via_focus(&mut self, index: Option<usize>) -> Transition {
        let active_changed = self.active_cell != index;
        self.active_cell = index;
        Transition {
            active_changed,
            selection_changed: false,
        }
    }

    /// Symmetric difference of the selection with `{id}`
    pub fn toggle_cell_selection(&mut self, id: CellId) -> Transition {
        if !self.selected_cells.remove(&id) {
            self.selected_cells.insert(id);
        }
        Transition {
            active_changed: false,
            selection_changed: true,
        }
    }

    /// Replace the selection
    pub fn set_selected_cells<I>(&mut self, ids: I) -> Transition
    where
        I: IntoIterator<Item = CellId>,
    {
        let selected: HashSet<CellId> = ids.into_iter().collect();
        let selection_changed = selected != self.selected_cells;
        self.selected_cells = selected;
        Transition {
            active_changed: false,
            selection_changed,
        }
    }

    /// Returns true if anything was selected
    pub fn clear_selection(&mut self) -> bool {
        let had_selection = !self.selected_cells.is_empty();
        self.selected_cells.clear();
        had_selection
    }

    /// Bring the state back in line with `notebook` after a commit.
    ///
    /// An empty notebook has no active cell and no selection. A notebook that
    /// was empty and gained cells activates its first cell. An active index
    /// past the end is clamped to the last cell, and selected IDs that are
    /// gone are dropped.
    pub fn reconcile<T>(&mut self, notebook: &Notebook<T>) -> Transition {
        let was_empty = std::mem::replace(&mut self.notebook_empty, notebook.is_empty());
        if notebook.is_empty() {
            let active_changed = self.active_cell.take().is_some();
            return Transition {
                active_changed,
                selection_changed: self.clear_selection(),
            };
        }

        let mut transition = Transition::default();
        if was_empty && self.active_cell.is_none() {
            self.active_cell = Some(0);
            transition.active_changed = true;
        }
        if let Some(active) = self.active_cell {
            if active >= notebook.len() {
                self.active_cell = notebook.last_index();
                transition.active_changed = true;
            }
        }

        let before = self.selected_cells.len();
        self.selected_cells.retain(|id| notebook.contains(*id));
        transition.selection_changed = self.selected_cells.len() != before;
        transition
    }
}
