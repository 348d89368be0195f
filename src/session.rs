//! # Edit Session
//!
//! One participant's editing session over a replicated notebook.
//!
//! An [`EditorSession`] owns the document handle together with the local
//! [`CellsState`] (active cell and selection). Every structural change is a
//! single transaction on the document; indices are always re-derived from
//! the current notebook, since remote merges may land between any two local
//! transactions.
//!
//! Observers are notified after the session has released its own state, so
//! they may call back into the session.
//!
//! ## Failure Policy
//!
//! - Stale IDs and out-of-range indices are silent no-ops (`Ok(false)`)
//! - Transaction failures are returned unmodified

use crate::{
    cell_drag_data, parse_cell_drag_data, Cell, CellContent, CellId, CellKind, CellsState, Commit,
    DocHandle, DocPath, DragData, DropEvent, EditorEvent, EventType, Notebook, NotebookError,
    Observers, Origin, ReplicatedDocument, Reorder, Subscription, TextSelection,
    TextSelectionSource, Transaction, Transition,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Display tag for a formal cell's content
pub type CellLabel<T> = Rc<dyn Fn(&T) -> Option<String>>;

struct Inner<T, D> {
    doc: D,
    state: CellsState,
    label: Option<CellLabel<T>>,

    /// Commits and transitions not yet announced to observers
    commits: Vec<(Commit, Origin)>,
    transition: Transition,
}

impl<T: Clone, D: ReplicatedDocument<T>> Inner<T, D> {
    fn notebook(&self) -> &Notebook<T> {
        self.doc.notebook()
    }

    fn mutate<F>(&mut self, f: F) -> Result<Commit, NotebookError>
    where
        F: FnOnce(&mut Transaction<'_, T>) -> Result<(), NotebookError>,
    {
        let commit = self.doc.mutate(f)?;
        self.record(commit, Origin::Local);
        Ok(commit)
    }

    fn record(&mut self, commit: Commit, origin: Origin) {
        if commit.changes == 0 {
            return;
        }
        self.commits.push((commit, origin));
        let transition = self.state.reconcile(self.doc.notebook());
        self.transition = self.transition.merge(transition);
    }

    /// Move focus to `index`, clamped to the notebook, clearing the selection
    fn set_active(&mut self, index: Option<usize>) {
        let index = self.clamp(index);
        let transition = self.state.set_active_cell(index);
        self.transition = self.transition.merge(transition);
    }

    fn set_active_via_focus(&mut self, index: Option<usize>) {
        let index = self.clamp(index);
        let transition = self.state.set_active_cell_via_focus(index);
        self.transition = self.transition.merge(transition);
    }

    fn clamp(&self, index: Option<usize>) -> Option<usize> {
        let last = self.notebook().last_index();
        match index {
            Some(i) if last.is_some_and(|last| i > last) => {
                debug!(index = i, ?last, "clamping active cell index");
                last
            }
            Some(_) if last.is_none() => None,
            other => other,
        }
    }

    fn take_events(&mut self) -> Vec<EventType> {
        let mut events: Vec<EventType> = self
            .commits
            .drain(..)
            .map(|(commit, origin)| EventType::DocumentChanged {
                version: commit.version,
                origin,
                changes: commit.changes,
            })
            .collect();

        let transition = std::mem::take(&mut self.transition);
        if transition.active_changed {
            trace!(active = ?self.state.active_cell(), "active cell changed");
            events.push(EventType::ActiveCellChanged {
                active: self.state.active_cell(),
            });
        }
        if transition.selection_changed {
            trace!(selected = self.state.selected_cells().len(), "selection changed");
            events.push(EventType::SelectionChanged {
                selected: self.state.selected_sorted(),
            });
        }
        events
    }
}

/// Shared handle to one editing session
pub struct EditorSession<T, D> {
    inner: Rc<RefCell<Inner<T, D>>>,
    events: Observers<EditorEvent>,
    text_selection: TextSelectionSource,
}

/// Non-owning handle to a session, for long-lived host callbacks
pub struct WeakEditorSession<T, D> {
    inner: Weak<RefCell<Inner<T, D>>>,
    events: Observers<EditorEvent>,
    text_selection: TextSelectionSource,
}

impl<T, D> Clone for EditorSession<T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            events: self.events.clone(),
            text_selection: self.text_selection.clone(),
        }
    }
}

impl<T, D> Clone for WeakEditorSession<T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            events: self.events.clone(),
            text_selection: self.text_selection.clone(),
        }
    }
}

impl<T, D> WeakEditorSession<T, D> {
    pub fn upgrade(&self) -> Option<EditorSession<T, D>> {
        Some(EditorSession {
            inner: self.inner.upgrade()?,
            events: self.events.clone(),
            text_selection: self.text_selection.clone(),
        })
    }
}

impl<T, D> EditorSession<T, D>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    /// Start a session with its own text selection source
    pub fn new(doc: D) -> Self {
        Self::with_text_selection(doc, TextSelectionSource::new())
    }

    /// Start a session on a host's text selection
    pub fn with_text_selection(doc: D, text_selection: TextSelectionSource) -> Self {
        let state = CellsState::new(doc.notebook().len());
        Self {
            inner: Rc::new(RefCell::new(Inner {
                doc,
                state,
                label: None,
                commits: Vec::new(),
                transition: Transition::default(),
            })),
            events: Observers::new(),
            text_selection,
        }
    }

    pub fn downgrade(&self) -> WeakEditorSession<T, D> {
        WeakEditorSession {
            inner: Rc::downgrade(&self.inner),
            events: self.events.clone(),
            text_selection: self.text_selection.clone(),
        }
    }

    /// Run `f` against the session state, then notify observers
    fn update<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Inner<T, D>) -> R,
    {
        let (result, events) = {
            let mut inner = self.inner.borrow_mut();
            let result = f(&mut inner);
            (result, inner.take_events())
        };
        for event in events {
            self.events.notify(&EditorEvent::new(event));
        }
        result
    }

    // ========== Observation ==========

    /// Observe committed transactions and state transitions
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&EditorEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn set_cell_label<F>(&self, label: F)
    where
        F: Fn(&T) -> Option<String> + 'static,
    {
        self.inner.borrow_mut().label = Some(Rc::new(label));
    }

    pub fn with_notebook<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&Notebook<T>) -> R,
    {
        f(self.inner.borrow().notebook())
    }

    pub fn with_document<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&D) -> R,
    {
        f(&self.inner.borrow().doc)
    }

    pub fn len(&self) -> usize {
        self.with_notebook(Notebook::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<CellId> {
        self.with_notebook(Notebook::ids)
    }

    pub fn handle(&self) -> DocHandle {
        self.inner.borrow().doc.handle()
    }

    pub fn active_cell(&self) -> Option<usize> {
        self.inner.borrow().state.active_cell()
    }

    pub fn selected_cells(&self) -> HashSet<CellId> {
        self.inner.borrow().state.selected_cells().clone()
    }

    pub fn is_selected(&self, id: CellId) -> bool {
        self.inner.borrow().state.is_selected(id)
    }

    pub fn state(&self) -> CellsState {
        self.inner.borrow().state.clone()
    }

    // ========== Focus and Selection ==========

    /// User navigated to `index`; clears the selection
    pub fn set_active_cell(&self, index: Option<usize>) {
        self.update(|inner| inner.set_active(index));
    }

    /// A child editor reported focus; keeps the selection
    pub fn set_active_cell_via_focus(&self, index: Option<usize>) {
        self.update(|inner| inner.set_active_via_focus(index));
    }

    /// Focus report from the editor of cell `id`. Returns false if it is gone
    pub fn focus_cell(&self, id: CellId) -> bool {
        self.update(|inner| match inner.notebook().position(id) {
            Some(index) => {
                inner.set_active_via_focus(Some(index));
                true
            }
            None => {
                debug!(%id, "ignoring focus of stale cell");
                false
            }
        })
    }

    pub fn toggle_cell_selection(&self, id: CellId) {
        self.update(|inner| {
            let transition = inner.state.toggle_cell_selection(id);
            inner.transition = inner.transition.merge(transition);
        });
    }

    /// Replace the selection. IDs not in the notebook are dropped. A
    /// non-empty cell selection cancels any native text selection
    pub fn set_selected_cells<I>(&self, ids: I)
    where
        I: IntoIterator<Item = CellId>,
    {
        let selecting = self.update(|inner| {
            let ids: Vec<CellId> = ids
                .into_iter()
                .filter(|id| inner.notebook().contains(*id))
                .collect();
            let transition = inner.state.set_selected_cells(ids);
            inner.transition = inner.transition.merge(transition);
            !inner.state.selected_cells().is_empty()
        });
        if selecting {
            self.text_selection.clear();
        }
    }

    pub fn clear_selection(&self) {
        self.set_selected_cells(std::iter::empty());
    }

    /// Click on a cell body. With the modifier held the click toggles the
    /// cell's selection; a plain click is left to the cell's own editor
    pub fn handle_cell_click(&self, id: CellId, with_modifier: bool) -> bool {
        if !with_modifier {
            return false;
        }
        if !self.with_notebook(|nb| nb.contains(id)) {
            debug!(%id, "ignoring click on stale cell");
            return false;
        }
        self.toggle_cell_selection(id);
        true
    }

    /// Native text selection changed. A text range cancels the cell selection
    pub fn handle_text_selection(&self, selection: &TextSelection) {
        if !selection.is_range() {
            return;
        }
        self.update(|inner| {
            if inner.state.clear_selection() {
                trace!("text selection cleared cell selection");
                inner.transition.selection_changed = true;
            }
        });
    }

    // ========== Cell Lifecycle ==========

    /// Insert after the active cell (at 0 with no active cell) and focus it
    pub fn add_after_active_cell(&self, cell: Cell<T>) -> Result<(), NotebookError> {
        self.update(|inner| -> Result<(), NotebookError> {
            let index = inner.state.active_cell().map_or(0, |a| a + 1);
            inner.mutate(|txn| txn.insert(index, cell))?;
            inner.set_active(Some(index));
            Ok(())
        })
    }

    /// Fill the active stem cell with `cell`, or insert after the active cell
    pub fn add_or_replace_active_cell(&self, cell: Cell<T>) -> Result<(), NotebookError> {
        let replace_at = {
            let inner = self.inner.borrow();
            inner
                .state
                .active_cell()
                .filter(|&a| inner.notebook().get(a).is_some_and(Cell::is_stem))
        };
        match replace_at {
            Some(index) => self.replace_cell_with(index, cell).map(|_| ()),
            None => self.add_after_active_cell(cell),
        }
    }

    /// Insert at the end and focus the new last cell
    pub fn append_cell(&self, cell: Cell<T>) -> Result<(), NotebookError> {
        self.update(|inner| -> Result<(), NotebookError> {
            let index = inner.notebook().len();
            inner.mutate(|txn| txn.insert(index, cell))?;
            inner.set_active(Some(index));
            Ok(())
        })
    }

    /// Overwrite the cell at `index` in place. Does not move focus
    pub fn replace_cell_with(&self, index: usize, cell: Cell<T>) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            if index >= inner.notebook().len() {
                debug!(index, "ignoring replace of stale index");
                return Ok(false);
            }
            inner.mutate(|txn| txn.replace(index, cell).map(|_| ()))?;
            Ok(true)
        })
    }

    /// Insert a stem cell at `index` and focus it
    pub fn create_above(&self, index: usize) -> Result<bool, NotebookError> {
        self.insert_stem(index)
    }

    /// Insert a stem cell at `index + 1` and focus it
    pub fn create_below(&self, index: usize) -> Result<bool, NotebookError> {
        let Some(below) = index.checked_add(1) else {
            debug!(index, "ignoring insert at stale index");
            return Ok(false);
        };
        self.insert_stem(below)
    }

    fn insert_stem(&self, index: usize) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            if index > inner.notebook().len() {
                debug!(index, "ignoring insert at stale index");
                return Ok(false);
            }
            inner.mutate(|txn| txn.insert(index, Cell::stem()))?;
            inner.set_active(Some(index));
            Ok(true)
        })
    }

    /// Remove the cell at `index` and focus the one before it
    pub fn delete_backward(&self, index: usize) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            if index >= inner.notebook().len() {
                debug!(index, "ignoring delete of stale index");
                return Ok(false);
            }
            inner.mutate(|txn| txn.remove(index).map(|_| ()))?;
            inner.set_active(index.checked_sub(1));
            Ok(true)
        })
    }

    /// Remove the cell at `index` and focus whichever cell slides into it
    pub fn delete_forward(&self, index: usize) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            if index >= inner.notebook().len() {
                debug!(index, "ignoring delete of stale index");
                return Ok(false);
            }
            inner.mutate(|txn| txn.remove(index).map(|_| ()))?;
            inner.set_active(Some(index));
            Ok(true)
        })
    }

    /// Focus the cell above `index`. No-op at the first cell
    pub fn activate_above(&self, index: usize) -> bool {
        self.update(|inner| {
            if index == 0 || index >= inner.notebook().len() {
                return false;
            }
            inner.set_active(Some(index - 1));
            true
        })
    }

    /// Focus the cell below `index`. No-op at the last cell
    pub fn activate_below(&self, index: usize) -> bool {
        self.update(|inner| match index.checked_add(1) {
            Some(below) if below < inner.notebook().len() => {
                inner.set_active(Some(below));
                true
            }
            _ => false,
        })
    }

    /// Remove every selected cell in one transaction
    pub fn delete_selected_cells(&self) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            let mut indices: Vec<usize> = inner
                .state
                .selected_cells()
                .iter()
                .filter_map(|id| inner.notebook().position(*id))
                .collect();
            if indices.is_empty() {
                return Ok(false);
            }
            indices.sort_unstable();

            let first = indices[0];
            inner.mutate(|txn| {
                for &index in indices.iter().rev() {
                    txn.remove(index)?;
                }
                Ok(())
            })?;
            inner.set_active(Some(first));
            Ok(true)
        })
    }

    /// Per-cell actions bound to the cell currently at `index`
    pub fn cell_actions(&self, index: usize) -> Option<CellActions<T, D>> {
        let id = self.with_notebook(|nb| nb.get(index).map(|c| c.id))?;
        Some(CellActions {
            session: self.clone(),
            index,
            id,
        })
    }

    // ========== Content ==========

    /// Apply `f` to the formal content of cell `id` in one transaction
    pub fn change_content<F>(&self, id: CellId, f: F) -> Result<bool, NotebookError>
    where
        F: FnOnce(&mut T),
    {
        self.update(|inner| -> Result<bool, NotebookError> {
            let Some(index) = inner.notebook().position(id) else {
                debug!(%id, "ignoring content change of stale cell");
                return Ok(false);
            };
            inner.mutate(|txn| txn.update_formal(index, f))?;
            Ok(true)
        })
    }

    /// Apply `f` to the text of rich-text cell `id` in one transaction
    pub fn edit_rich_text<F>(&self, id: CellId, f: F) -> Result<bool, NotebookError>
    where
        F: FnOnce(&mut String),
    {
        self.update(|inner| -> Result<bool, NotebookError> {
            let Some(index) = inner.notebook().position(id) else {
                debug!(%id, "ignoring text edit of stale cell");
                return Ok(false);
            };
            inner.mutate(|txn| txn.update_rich_text(index, f))?;
            Ok(true)
        })
    }

    /// Rich-text edit addressed by document path
    pub fn edit_rich_text_at<F>(&self, path: &DocPath, f: F) -> Result<bool, NotebookError>
    where
        F: FnOnce(&mut String),
    {
        match path.cell_id() {
            Some(id) => self.edit_rich_text(id, f),
            None => {
                debug!(%path, "ignoring text edit at unknown path");
                Ok(false)
            }
        }
    }

    // ========== Reordering ==========

    /// Move a cell next to another one. Stale IDs make this a no-op
    pub fn reorder(&self, reorder: Reorder) -> Result<bool, NotebookError> {
        self.update(|inner| -> Result<bool, NotebookError> {
            let Some(commit) = reorder.apply::<T, D>(&mut inner.doc)? else {
                return Ok(false);
            };
            inner.record(commit, Origin::Local);
            Ok(true)
        })
    }

    /// Handle a finished drag gesture from the host
    pub fn handle_drop(&self, event: &DropEvent) -> Result<bool, NotebookError> {
        match Reorder::from_drop(event) {
            Some(reorder) => self.reorder(reorder),
            None => {
                debug!("ignoring drop without notebook cell payloads");
                Ok(false)
            }
        }
    }

    /// Whether a dragged payload is a live notebook cell
    pub fn is_droppable(&self, source: &DragData) -> bool {
        parse_cell_drag_data(source).is_some_and(|id| self.with_notebook(|nb| nb.contains(id)))
    }

    /// Whether `source` may be dropped onto cell `target`
    pub fn can_drop_on(&self, target: CellId, source: &DragData) -> bool {
        parse_cell_drag_data(source).is_some_and(|id| id != target) && self.is_droppable(source)
    }

    // ========== Remote Changes ==========

    /// Merge an update from another replica and reconcile focus and selection
    pub fn merge_remote(&self, update: D::Update) -> Result<Commit, NotebookError> {
        self.update(|inner| -> Result<Commit, NotebookError> {
            let commit = inner.doc.merge_remote(update)?;
            inner.record(commit, Origin::Remote);
            Ok(commit)
        })
    }

    // ========== Rendering ==========

    /// Everything a renderer needs for one pass over the notebook.
    ///
    /// Labels are computed after the session is released, so a label
    /// function may call back into the session.
    pub fn views(&self) -> Vec<CellView<T, D>> {
        let (mut views, label) = {
            let inner = self.inner.borrow();
            (self.collect_views(&inner), inner.label.clone())
        };
        if let Some(label) = label {
            for view in &mut views {
                if let CellBody::Formal { content, label: tag } = &mut view.body {
                    *tag = label(&*content);
                }
            }
        }
        views
    }

    fn collect_views(&self, inner: &Inner<T, D>) -> Vec<CellView<T, D>> {
        let handle = inner.doc.handle();
        inner
            .notebook()
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let body = match &cell.content {
                    CellContent::Stem => CellBody::Stem,
                    CellContent::RichText(_) => CellBody::RichText {
                        handle,
                        path: inner.doc.cell_path(cell.id).unwrap_or_default(),
                    },
                    CellContent::Formal(content) => CellBody::Formal {
                        content: content.clone(),
                        label: None,
                    },
                };
                CellView {
                    id: cell.id,
                    index,
                    is_active: inner.state.is_active(index),
                    is_selected: inner.state.is_selected(cell.id),
                    body,
                    actions: CellActions {
                        session: self.clone(),
                        index,
                        id: cell.id,
                    },
                }
            })
            .collect()
    }
}

impl<T, D> fmt::Debug for EditorSession<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("EditorSession")
                .field("state", &inner.state)
                .field("observers", &self.events.len())
                .finish(),
            Err(_) => f.write_str("EditorSession { <busy> }"),
        }
    }
}

/// Actions of one rendered cell, bound to its index for that render
pub struct CellActions<T, D> {
    session: EditorSession<T, D>,
    index: usize,
    id: CellId,
}

impl<T, D> Clone for CellActions<T, D> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            index: self.index,
            id: self.id,
        }
    }
}

impl<T, D> CellActions<T, D>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn create_above(&self) -> Result<bool, NotebookError> {
        self.session.create_above(self.index)
    }

    pub fn create_below(&self) -> Result<bool, NotebookError> {
        self.session.create_below(self.index)
    }

    pub fn delete_backward(&self) -> Result<bool, NotebookError> {
        self.session.delete_backward(self.index)
    }

    pub fn delete_forward(&self) -> Result<bool, NotebookError> {
        self.session.delete_forward(self.index)
    }

    pub fn activate_above(&self) -> bool {
        self.session.activate_above(self.index)
    }

    pub fn activate_below(&self) -> bool {
        self.session.activate_below(self.index)
    }

    /// The cell's editor gained focus
    pub fn has_focused(&self) {
        self.session.set_active_cell_via_focus(Some(self.index));
    }

    /// Formal editor's content callback
    pub fn change_content<F>(&self, f: F) -> Result<bool, NotebookError>
    where
        F: FnOnce(&mut T),
    {
        self.session.change_content(self.id, f)
    }

    /// Payload for making this cell draggable
    pub fn drag_data(&self) -> DragData {
        cell_drag_data(self.id)
    }
}

/// Kind-specific part of a rendered cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellBody<T> {
    Stem,
    RichText { handle: DocHandle, path: DocPath },
    Formal { content: T, label: Option<String> },
}

/// One cell as handed to the renderer
pub struct CellView<T, D> {
    pub id: CellId,
    pub index: usize,
    pub is_active: bool,
    pub is_selected: bool,
    pub body: CellBody<T>,
    pub actions: CellActions<T, D>,
}

impl<T, D> CellView<T, D> {
    pub fn kind(&self) -> CellKind {
        match self.body {
            CellBody::Stem => CellKind::Stem,
            CellBody::RichText { .. } => CellKind::RichText,
            CellBody::Formal { .. } => CellKind::Formal,
        }
    }
}
