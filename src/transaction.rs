//! # Transactions
//!
//! A [`Transaction`] is the only mutable view of a [`Notebook`] that callers
//! ever receive. Every structural or content change made through it is
//! journaled as an id-addressed [`NotebookChange`], which is what the
//! document substrate replays into its own storage on commit.
//!
//! ## Change Semantics
//!
//! - `Insert`: `index` is a position in the notebook before the insert
//! - `Move`: `to` is a position in the notebook after the cell is taken out
//! - `Replace`, `SetContent`: the cell keeps its position

use crate::{Cell, CellContent, CellId, Notebook, NotebookError};
use std::ops::Deref;

/// One journaled, id-addressed notebook change
#[derive(Debug, Clone, PartialEq)]
pub enum NotebookChange<T> {
    Insert { index: usize, cell: Cell<T> },
    Remove { id: CellId },
    Replace { id: CellId, cell: Cell<T> },
    Move { id: CellId, to: usize },
    SetContent { id: CellId, content: CellContent<T> },
}

/// Mutable view of a notebook for the duration of one `mutate` call
pub struct Transaction<'a, T> {
    notebook: &'a mut Notebook<T>,
    changes: Vec<NotebookChange<T>>,
}

impl<'a, T: Clone> Transaction<'a, T> {
    pub(crate) fn new(notebook: &'a mut Notebook<T>) -> Self {
        Self {
            notebook,
            changes: Vec::new(),
        }
    }

    pub(crate) fn into_changes(self) -> Vec<NotebookChange<T>> {
        self.changes
    }

    /// Insert a cell at `index` (`index == len` appends)
    pub fn insert(&mut self, index: usize, cell: Cell<T>) -> Result<(), NotebookError> {
        self.notebook.insert(index, cell.clone())?;
        self.changes.push(NotebookChange::Insert { index, cell });
        Ok(())
    }

    /// Append a cell at the end
    pub fn push(&mut self, cell: Cell<T>) -> Result<(), NotebookError> {
        let index = self.notebook.len();
        self.insert(index, cell)
    }

    pub fn remove(&mut self, index: usize) -> Result<Cell<T>, NotebookError> {
        let removed = self.notebook.remove(index)?;
        self.changes.push(NotebookChange::Remove { id: removed.id });
        Ok(removed)
    }

    /// Overwrite the cell at `index`, preserving its position
    pub fn replace(&mut self, index: usize, cell: Cell<T>) -> Result<Cell<T>, NotebookError> {
        let old = self.notebook.replace(index, cell.clone())?;
        self.changes.push(NotebookChange::Replace { id: old.id, cell });
        Ok(old)
    }

    /// Remove the cell at `from` and reinsert it at `to`.
    ///
    /// `to` is an index into the sequence after the removal.
    pub fn move_cell(&mut self, from: usize, to: usize) -> Result<(), NotebookError> {
        let len = self.notebook.len();
        if from >= len {
            return Err(NotebookError::IndexOutOfBounds { index: from, len });
        }
        if to >= len {
            return Err(NotebookError::IndexOutOfBounds { index: to, len });
        }
        let cell = self.notebook.remove(from)?;
        let id = cell.id;
        self.notebook.insert(to, cell)?;
        self.changes.push(NotebookChange::Move { id, to });
        Ok(())
    }

    /// Apply `f` to the formal content of the cell at `index`
    pub fn update_formal<F>(&mut self, index: usize, f: F) -> Result<(), NotebookError>
    where
        F: FnOnce(&mut T),
    {
        let id = self.cell_id(index)?;
        match self.notebook.content_mut(index)? {
            CellContent::Formal(content) => f(content),
            _ => return Err(NotebookError::NotFormal(id)),
        }
        self.record_content(index, id)
    }

    /// Apply `f` to the text of the rich-text cell at `index`
    pub fn update_rich_text<F>(&mut self, index: usize, f: F) -> Result<(), NotebookError>
    where
        F: FnOnce(&mut String),
    {
        let id = self.cell_id(index)?;
        match self.notebook.content_mut(index)? {
            CellContent::RichText(text) => f(text),
            _ => return Err(NotebookError::NotRichText(id)),
        }
        self.record_content(index, id)
    }

    fn cell_id(&self, index: usize) -> Result<CellId, NotebookError> {
        self.notebook
            .get(index)
            .map(|c| c.id)
            .ok_or(NotebookError::IndexOutOfBounds {
                index,
                len: self.notebook.len(),
            })
    }

    fn record_content(&mut self, index: usize, id: CellId) -> Result<(), NotebookError> {
        let content = self.notebook.content_mut(index)?.clone();
        self.changes.push(NotebookChange::SetContent { id, content });
        Ok(())
    }
}

impl<T> Deref for Transaction<'_, T> {
    type Target = Notebook<T>;

    fn deref(&self) -> &Notebook<T> {
        self.notebook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn notebook(n: u32) -> Notebook<u32> {
        Notebook::from_cells((0..n).map(Cell::formal).collect()).unwrap()
    }

    #[test]
    fn test_journal_records_each_change() {
        let mut nb = notebook(2);
        let mut txn = Transaction::new(&mut nb);
        txn.push(Cell::stem()).unwrap();
        txn.remove(0).unwrap();
        txn.update_formal(0, |n| *n += 10).unwrap();

        let changes = txn.into_changes();
        assert_eq!(changes.len(), 3);
        assert_matches!(changes[0], NotebookChange::Insert { index: 2, .. });
        assert_matches!(changes[1], NotebookChange::Remove { .. });
        assert_matches!(
            &changes[2],
            NotebookChange::SetContent { content: CellContent::Formal(11), .. }
        );
    }

    #[test]
    fn test_move_cell() {
        let mut nb = notebook(3);
        let ids = nb.ids();
        {
            let mut txn = Transaction::new(&mut nb);
            txn.move_cell(0, 2).unwrap();
            assert_matches!(txn.move_cell(0, 3), Err(NotebookError::IndexOutOfBounds { .. }));
        }
        assert_eq!(nb.ids(), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_update_wrong_kind() {
        let mut nb: Notebook<u32> = Notebook::from_cells(vec![Cell::stem()]).unwrap();
        let mut txn = Transaction::new(&mut nb);
        assert_matches!(txn.update_formal(0, |_| {}), Err(NotebookError::NotFormal(_)));
        assert_matches!(txn.update_rich_text(0, |_| {}), Err(NotebookError::NotRichText(_)));
        assert!(txn.into_changes().is_empty());
    }
}
