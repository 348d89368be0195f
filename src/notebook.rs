use crate::{Cell, CellContent, CellId, NotebookError};

/// Ordered sequence of cells.
///
/// Order is caller-visible; positions are insertion points, not identifiers.
/// Cell IDs are unique within a notebook at all times. Outside of a
/// [`Transaction`](crate::Transaction) a notebook is read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook<T> {
    cells: Vec<Cell<T>>,
}

impl<T> Notebook<T> {
    /// Create a new empty notebook
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Create a notebook from existing cells, rejecting duplicate IDs
    pub fn from_cells(cells: Vec<Cell<T>>) -> Result<Self, NotebookError> {
        let mut notebook = Self::new();
        for cell in cells {
            let index = notebook.len();
            notebook.insert(index, cell)?;
        }
        Ok(notebook)
    }

    // ========== Read Access ==========

    pub fn cells(&self) -> &[Cell<T>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell<T>> {
        self.cells.get(index)
    }

    pub fn get_by_id(&self, id: CellId) -> Option<&Cell<T>> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Current index of a cell, looked up fresh
    pub fn position(&self, id: CellId) -> Option<usize> {
        self.cells.iter().position(|c| c.id == id)
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> Vec<CellId> {
        self.cells.iter().map(|c| c.id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell<T>> {
        self.cells.iter()
    }

    /// Index of the last cell, `None` when empty
    pub fn last_index(&self) -> Option<usize> {
        self.cells.len().checked_sub(1)
    }

    // ========== Structural Mutation (transactions only) ==========

    pub(crate) fn insert(&mut self, index: usize, cell: Cell<T>) -> Result<(), NotebookError> {
        if index > self.cells.len() {
            return Err(NotebookError::IndexOutOfBounds {
                index,
                len: self.cells.len(),
            });
        }
        if self.contains(cell.id) {
            return Err(NotebookError::DuplicateCellId(cell.id));
        }
        self.cells.insert(index, cell);
        Ok(())
    }

    pub(crate) fn remove(&mut self, index: usize) -> Result<Cell<T>, NotebookError> {
        self.check_index(index)?;
        Ok(self.cells.remove(index))
    }

    pub(crate) fn replace(&mut self, index: usize, cell: Cell<T>) -> Result<Cell<T>, NotebookError> {
        self.check_index(index)?;
        if let Some(existing) = self.position(cell.id) {
            if existing != index {
                return Err(NotebookError::DuplicateCellId(cell.id));
            }
        }
        Ok(std::mem::replace(&mut self.cells[index], cell))
    }

    pub(crate) fn content_mut(&mut self, index: usize) -> Result<&mut CellContent<T>, NotebookError> {
        self.check_index(index)?;
        Ok(&mut self.cells[index].content)
    }

    fn check_index(&self, index: usize) -> Result<(), NotebookError> {
        if index < self.cells.len() {
            Ok(())
        } else {
            Err(NotebookError::IndexOutOfBounds {
                index,
                len: self.cells.len(),
            })
        }
    }
}

impl<T> Default for Notebook<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a Notebook<T> {
    type Item = &'a Cell<T>;
    type IntoIter = std::slice::Iter<'a, Cell<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
