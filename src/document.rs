//! # Replicated Document
//!
//! Boundary to the mergeable storage that owns the notebook.
//!
//! The editor never holds a private copy of the cell sequence that it
//! mutates. All changes go through [`ReplicatedDocument::mutate`], which
//! commits the whole transaction or nothing, and through
//! [`ReplicatedDocument::merge_remote`] for updates arriving from other
//! replicas.
//!
//! [`LocalDocument`] is backed by a `yrs` CRDT document:
//!
//! - `cells`: array of cell IDs giving the notebook order
//! - `contents`: map from cell ID to the JSON-encoded cell content
//!
//! A transaction runs against a working copy of the notebook. On success its
//! journal is replayed into one `yrs` transaction, so other replicas receive
//! it as a single update. Replicas exchange v1-encoded updates through
//! [`LocalDocument::state_vector`] and [`LocalDocument::encode_delta`].
//!
//! A cell moved concurrently on two replicas can appear twice in `cells`;
//! only the first occurrence is part of the notebook, and later structural
//! edits of that cell drop the others.

use crate::{Cell, CellContent, CellId, Notebook, NotebookChange, NotebookError, Origin, Transaction};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use ulid::Ulid;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Array, ArrayRef, Doc, Map, MapRef, ReadTxn, StateVector, Transact, TransactionMut, Update};

const CELLS: &str = "cells";
const CONTENTS: &str = "contents";

/// Handle identifying a shared document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocHandle(Ulid);

impl DocHandle {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn id(&self) -> Ulid {
        self.0
    }
}

impl Default for DocHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc:{}", self.0)
    }
}

/// Stable address of a sub-structure inside a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DocPath(Vec<String>);

impl DocPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The cell addressed by a `cells/<id>/...` path
    pub fn cell_id(&self) -> Option<CellId> {
        let at = self.0.iter().position(|s| s == CELLS)?;
        let segment = self.0.get(at + 1)?;
        Ulid::from_str(segment).ok()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Result of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    /// Document version after the commit
    pub version: u64,

    /// Number of changes that were applied
    pub changes: usize,
}

/// The mergeable document substrate the editor runs on
pub trait ReplicatedDocument<T> {
    /// Encoded change set exchanged between replicas
    type Update;

    fn handle(&self) -> DocHandle;

    /// Current authoritative notebook
    fn notebook(&self) -> &Notebook<T>;

    fn version(&self) -> u64;

    /// Path of the independently edited content region of a cell
    fn cell_path(&self, id: CellId) -> Option<DocPath>;

    /// Apply `f` as one atomic change.
    ///
    /// If `f` fails nothing is committed and the error is returned unchanged.
    fn mutate<F>(&mut self, f: F) -> Result<Commit, NotebookError>
    where
        F: FnOnce(&mut Transaction<'_, T>) -> Result<(), NotebookError>;

    /// Merge an update from another replica as one atomic change
    fn merge_remote(&mut self, update: Self::Update) -> Result<Commit, NotebookError>;
}

/// A committed transaction kept in document history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedTransaction {
    pub version: u64,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
    pub changes: usize,
}

/// A journaled change, encoded and ready to write into the CRDT
enum CellOp {
    Insert { index: usize, id: CellId, content: String },
    Remove { id: CellId },
    Replace { id: CellId, with: CellId, content: String },
    Move { id: CellId, to: usize },
    SetContent { id: CellId, content: String },
}

/// One visible cell and where its first occurrence sits in `cells`
struct Slot {
    id: CellId,
    at: u32,
    content: String,
}

/// In-process replicated document backed by `yrs`
pub struct LocalDocument<T> {
    handle: DocHandle,
    root: DocPath,
    doc: Doc,
    cells: ArrayRef,
    contents: MapRef,
    notebook: Notebook<T>,
    snapshot: Vec<(CellId, String)>,
    version: u64,
    history: Vec<CommittedTransaction>,
}

impl<T> LocalDocument<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Create a new document with an empty notebook
    pub fn new() -> Self {
        Self::empty(DocHandle::new(), DocPath::root())
    }

    /// Create a new document holding `notebook`
    pub fn with_notebook(notebook: Notebook<T>) -> Result<Self, NotebookError> {
        let mut doc = Self::new();
        let changes = notebook
            .iter()
            .enumerate()
            .map(|(index, cell)| NotebookChange::Insert {
                index,
                cell: cell.clone(),
            })
            .collect();
        doc.write(changes)?;
        Ok(doc)
    }

    fn empty(handle: DocHandle, root: DocPath) -> Self {
        let doc = Doc::new();
        let cells = doc.get_or_insert_array(CELLS);
        let contents = doc.get_or_insert_map(CONTENTS);
        Self {
            handle,
            root,
            doc,
            cells,
            contents,
            notebook: Notebook::new(),
            snapshot: Vec::new(),
            version: 0,
            history: Vec::new(),
        }
    }

    /// Mount the notebook at `root` inside a larger document
    pub fn at_path(mut self, root: DocPath) -> Self {
        self.root = root;
        self
    }

    /// Create a replica of this document sharing its handle and state
    pub fn replica(&self) -> Result<Self, NotebookError> {
        let mut replica = Self::empty(self.handle, self.root.clone());
        replica.apply_update(&self.encode_state())?;
        replica.version = self.version;
        Ok(replica)
    }

    /// All committed transactions, oldest first
    pub fn history(&self) -> &[CommittedTransaction] {
        &self.history
    }

    /// State vector of this replica, for requesting a delta from a peer
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode everything a peer with `state_vector` has not seen yet
    pub fn encode_delta(&self, state_vector: &[u8]) -> Result<Vec<u8>, NotebookError> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| NotebookError::Sync(format!("Failed to decode state vector: {}", e)))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Replay journaled changes into one CRDT transaction
    fn write(&mut self, changes: Vec<NotebookChange<T>>) -> Result<(), NotebookError> {
        // Encode everything first so a failure cannot leave a partial write
        let ops = changes
            .into_iter()
            .map(encode_change)
            .collect::<Result<Vec<_>, _>>()?;
        {
            let mut txn = self.doc.transact_mut();
            for op in ops {
                apply_op(&self.cells, &self.contents, &mut txn, op);
            }
        }
        self.refresh()?;
        Ok(())
    }

    fn apply_update(&mut self, update: &[u8]) -> Result<usize, NotebookError> {
        let update = Update::decode_v1(update)
            .map_err(|e| NotebookError::Sync(format!("Failed to decode update: {}", e)))?;
        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| NotebookError::Sync(format!("Failed to apply update: {}", e)))?;
        }
        self.refresh()
    }

    /// Rebuild the notebook from the CRDT. Returns how many positions changed
    fn refresh(&mut self) -> Result<usize, NotebookError> {
        let slots = {
            let txn = self.doc.transact();
            read_slots(&self.cells, &self.contents, &txn)
        };

        let mut cells = Vec::with_capacity(slots.len());
        let mut snapshot = Vec::with_capacity(slots.len());
        for slot in slots {
            match serde_json::from_str::<CellContent<T>>(&slot.content) {
                Ok(content) => {
                    cells.push(Cell::with_id(slot.id, content));
                    snapshot.push((slot.id, slot.content));
                }
                Err(err) => warn!(doc = %self.handle, id = %slot.id, error = %err, "skipping undecodable cell"),
            }
        }

        let changed = count_differences(&self.snapshot, &snapshot);
        self.notebook = Notebook::from_cells(cells)?;
        self.snapshot = snapshot;
        Ok(changed)
    }

    fn record(&mut self, changes: usize, origin: Origin) -> Commit {
        if changes == 0 {
            return Commit {
                version: self.version,
                changes: 0,
            };
        }

        self.version += 1;
        self.history.push(CommittedTransaction {
            version: self.version,
            origin,
            timestamp: Utc::now(),
            changes,
        });

        debug!(doc = %self.handle, version = self.version, ?origin, changes, "committed transaction");
        Commit {
            version: self.version,
            changes,
        }
    }
}

impl<T> Default for LocalDocument<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LocalDocument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDocument")
            .field("handle", &self.handle)
            .field("root", &self.root)
            .field("cells", &self.snapshot.len())
            .field("version", &self.version)
            .finish()
    }
}

impl<T> ReplicatedDocument<T> for LocalDocument<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    type Update = Vec<u8>;

    fn handle(&self) -> DocHandle {
        self.handle
    }

    fn notebook(&self) -> &Notebook<T> {
        &self.notebook
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn cell_path(&self, id: CellId) -> Option<DocPath> {
        if !self.notebook.contains(id) {
            return None;
        }
        Some(self.root.join(CELLS).join(id.to_string()).join("content"))
    }

    fn mutate<F>(&mut self, f: F) -> Result<Commit, NotebookError>
    where
        F: FnOnce(&mut Transaction<'_, T>) -> Result<(), NotebookError>,
    {
        let mut working = self.notebook.clone();
        let changes = {
            let mut txn = Transaction::new(&mut working);
            if let Err(err) = f(&mut txn) {
                warn!(doc = %self.handle, error = %err, "transaction discarded");
                return Err(err);
            }
            txn.into_changes()
        };

        let count = changes.len();
        if count > 0 {
            self.write(changes)?;
        }
        Ok(self.record(count, Origin::Local))
    }

    fn merge_remote(&mut self, update: Vec<u8>) -> Result<Commit, NotebookError> {
        let changed = self.apply_update(&update)?;
        info!(doc = %self.handle, bytes = update.len(), changed, "merged remote update");
        Ok(self.record(changed, Origin::Remote))
    }
}

fn encode_change<T: Serialize>(change: NotebookChange<T>) -> Result<CellOp, NotebookError> {
    let encode = |content: &CellContent<T>| {
        serde_json::to_string(content)
            .map_err(|e| NotebookError::Sync(format!("Failed to encode cell content: {}", e)))
    };
    Ok(match change {
        NotebookChange::Insert { index, cell } => CellOp::Insert {
            index,
            id: cell.id,
            content: encode(&cell.content)?,
        },
        NotebookChange::Remove { id } => CellOp::Remove { id },
        NotebookChange::Replace { id, cell } => CellOp::Replace {
            id,
            with: cell.id,
            content: encode(&cell.content)?,
        },
        NotebookChange::Move { id, to } => CellOp::Move { id, to },
        NotebookChange::SetContent { id, content } => CellOp::SetContent {
            id,
            content: encode(&content)?,
        },
    })
}

/// Visible cells in order: first occurrence of each ID that has content
fn read_slots<R: ReadTxn>(cells: &ArrayRef, contents: &MapRef, txn: &R) -> Vec<Slot> {
    let mut seen = HashSet::new();
    let mut slots = Vec::new();
    for (at, value) in cells.iter(txn).enumerate() {
        let Ok(id) = Ulid::from_str(&value.to_string(txn)) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        if let Some(content) = contents.get(txn, &id.to_string()) {
            slots.push(Slot {
                id,
                at: at as u32,
                content: content.to_string(txn),
            });
        }
    }
    slots
}

/// Array position that puts a new entry before the visible cell at `index`
fn position_for(cells: &ArrayRef, contents: &MapRef, txn: &TransactionMut, index: usize) -> u32 {
    read_slots(cells, contents, txn)
        .get(index)
        .map(|slot| slot.at)
        .unwrap_or_else(|| cells.len(txn))
}

/// Drop every occurrence of `id` from the order. Returns the first position
fn remove_occurrences(cells: &ArrayRef, txn: &mut TransactionMut, id: CellId) -> Option<u32> {
    let key = id.to_string();
    let positions: Vec<u32> = {
        let read: &TransactionMut = txn;
        cells
            .iter(read)
            .enumerate()
            .filter_map(|(at, value)| (value.to_string(read) == key).then_some(at as u32))
            .collect()
    };
    for &at in positions.iter().rev() {
        cells.remove(txn, at);
    }
    positions.first().copied()
}

fn apply_op(cells: &ArrayRef, contents: &MapRef, txn: &mut TransactionMut, op: CellOp) {
    match op {
        CellOp::Insert { index, id, content } => {
            let at = position_for(cells, contents, txn, index);
            contents.insert(txn, id.to_string(), content);
            cells.insert(txn, at, id.to_string());
        }
        CellOp::Remove { id } => {
            remove_occurrences(cells, txn, id);
            contents.remove(txn, &id.to_string());
        }
        CellOp::Replace { id, with, content } => {
            let Some(at) = remove_occurrences(cells, txn, id) else {
                return;
            };
            contents.remove(txn, &id.to_string());
            contents.insert(txn, with.to_string(), content);
            cells.insert(txn, at, with.to_string());
        }
        CellOp::Move { id, to } => {
            if remove_occurrences(cells, txn, id).is_none() {
                return;
            }
            let at = position_for(cells, contents, txn, to);
            cells.insert(txn, at, id.to_string());
        }
        CellOp::SetContent { id, content } => {
            contents.insert(txn, id.to_string(), content);
        }
    }
}

fn count_differences(before: &[(CellId, String)], after: &[(CellId, String)]) -> usize {
    let changed = before.iter().zip(after).filter(|(a, b)| a != b).count();
    changed + before.len().abs_diff(after.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn formal_values(doc: &LocalDocument<u32>) -> Vec<Option<u32>> {
        doc.notebook()
            .iter()
            .map(|c| c.content.as_formal().copied())
            .collect()
    }

    /// Exchange deltas in both directions
    fn sync(a: &mut LocalDocument<u32>, b: &mut LocalDocument<u32>) {
        let to_b = a.encode_delta(&b.state_vector()).unwrap();
        let to_a = b.encode_delta(&a.state_vector()).unwrap();
        b.merge_remote(to_b).unwrap();
        a.merge_remote(to_a).unwrap();
    }

    fn pair(values: &[u32]) -> (LocalDocument<u32>, LocalDocument<u32>) {
        let cells = values.iter().copied().map(Cell::formal).collect();
        let a = LocalDocument::with_notebook(Notebook::from_cells(cells).unwrap()).unwrap();
        let b = a.replica().unwrap();
        (a, b)
    }

    #[test]
    fn test_mutate_commits_atomically() {
        let mut doc: LocalDocument<u32> = LocalDocument::new();
        let commit = doc
            .mutate(|txn| {
                txn.push(Cell::stem())?;
                txn.push(Cell::formal(1))
            })
            .unwrap();

        assert_eq!(commit, Commit { version: 1, changes: 2 });
        assert_eq!(doc.notebook().len(), 2);
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn test_failed_transaction_leaves_no_trace() {
        let mut doc: LocalDocument<u32> = LocalDocument::new();
        let before = doc.state_vector();
        let result = doc.mutate(|txn| {
            txn.push(Cell::stem())?;
            txn.remove(7)?;
            Ok(())
        });

        assert_matches!(result, Err(NotebookError::IndexOutOfBounds { index: 7, len: 1 }));
        assert!(doc.notebook().is_empty());
        assert_eq!(doc.version(), 0);
        assert!(doc.history().is_empty());
        assert_eq!(doc.state_vector(), before);
    }

    #[test]
    fn test_caller_error_is_returned_unmodified() {
        let mut doc: LocalDocument<u32> = LocalDocument::new();
        let result = doc.mutate(|_| Err(NotebookError::Transaction("conflict".to_string())));
        assert_eq!(result, Err(NotebookError::Transaction("conflict".to_string())));
    }

    #[test]
    fn test_empty_transaction_does_not_bump_version() {
        let mut doc: LocalDocument<u32> = LocalDocument::new();
        let commit = doc.mutate(|_| Ok(())).unwrap();
        assert_eq!(commit.changes, 0);
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_structural_edits_round_trip_through_crdt() {
        let (mut doc, _) = pair(&[0, 1, 2, 3]);
        doc.mutate(|txn| {
            txn.move_cell(0, 3)?;
            txn.remove(0)?;
            txn.replace(0, Cell::rich_text())?;
            txn.insert(1, Cell::formal(9))?;
            txn.update_formal(2, |n| *n += 100)
        })
        .unwrap();

        let replica = doc.replica().unwrap();
        assert_eq!(replica.notebook(), doc.notebook());
        assert_eq!(formal_values(&doc), vec![None, Some(9), Some(103), Some(0)]);
    }

    #[test]
    fn test_cell_path() {
        let cell: Cell<u32> = Cell::rich_text();
        let id = cell.id;
        let doc = LocalDocument::with_notebook(Notebook::from_cells(vec![cell]).unwrap())
            .unwrap()
            .at_path(DocPath::root().join("notebook"));

        let path = doc.cell_path(id).unwrap();
        assert_eq!(path.to_string(), format!("/notebook/cells/{}/content", id));
        assert_eq!(path.cell_id(), Some(id));
        assert_eq!(doc.cell_path(Ulid::new()), None);
    }

    #[test]
    fn test_replicas_converge() {
        let (mut a, mut b) = pair(&[1]);

        a.mutate(|txn| txn.push(Cell::formal(2))).unwrap();
        b.mutate(|txn| txn.update_formal(0, |n| *n = 10)).unwrap();
        sync(&mut a, &mut b);

        assert_eq!(a.notebook(), b.notebook());
        assert_eq!(formal_values(&a), vec![Some(10), Some(2)]);
        assert_eq!(a.history().last().unwrap().origin, Origin::Remote);
    }

    #[test]
    fn test_concurrent_appends_converge() {
        let (mut a, mut b) = pair(&[0]);

        a.mutate(|txn| txn.push(Cell::formal(1))).unwrap();
        b.mutate(|txn| txn.push(Cell::formal(2))).unwrap();
        sync(&mut a, &mut b);

        assert_eq!(a.notebook(), b.notebook());
        assert_eq!(a.notebook().len(), 3);
    }

    #[test]
    fn test_concurrent_content_edits_converge() {
        let (mut a, mut b) = pair(&[0]);

        a.mutate(|txn| txn.update_formal(0, |n| *n = 10)).unwrap();
        b.mutate(|txn| txn.update_formal(0, |n| *n = 20)).unwrap();
        sync(&mut a, &mut b);

        assert_eq!(a.notebook(), b.notebook());
        assert_matches!(formal_values(&a).as_slice(), [Some(10)] | [Some(20)]);
    }

    #[test]
    fn test_concurrent_moves_converge() {
        let (mut a, mut b) = pair(&[0, 1, 2, 3]);

        a.mutate(|txn| txn.move_cell(0, 3)).unwrap();
        b.mutate(|txn| txn.move_cell(0, 1)).unwrap();
        sync(&mut a, &mut b);

        assert_eq!(a.notebook(), b.notebook());
        assert_eq!(a.notebook().len(), 4);

        // moving the contested cell again leaves a single copy on both sides
        let contested = a.notebook().cells()[1].id;
        assert_eq!(formal_values(&a)[1], Some(0));
        a.mutate(|txn| txn.move_cell(1, 3)).unwrap();
        sync(&mut a, &mut b);
        assert_eq!(a.notebook(), b.notebook());
        assert_eq!(a.notebook().len(), 4);
        assert_eq!(b.notebook().position(contested), Some(3));
    }

    #[test]
    fn test_concurrent_remove_and_edit_converge() {
        let (mut a, mut b) = pair(&[0, 1]);

        a.mutate(|txn| txn.remove(1).map(|_| ())).unwrap();
        b.mutate(|txn| txn.update_formal(1, |n| *n = 5)).unwrap();
        sync(&mut a, &mut b);

        assert_eq!(a.notebook(), b.notebook());
        assert_eq!(formal_values(&a), vec![Some(0)]);
    }

    #[test]
    fn test_merging_known_update_changes_nothing() {
        let (mut a, mut b) = pair(&[0]);
        a.mutate(|txn| txn.push(Cell::stem())).unwrap();

        let update = a.encode_delta(&b.state_vector()).unwrap();
        assert_eq!(b.merge_remote(update.clone()).unwrap().changes, 1);
        let again = b.merge_remote(update).unwrap();
        assert_eq!(again.changes, 0);
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn test_malformed_update_is_rejected() {
        let mut doc: LocalDocument<u32> = LocalDocument::new();
        assert_matches!(doc.merge_remote(vec![0xff, 0x01]), Err(NotebookError::Sync(_)));
        assert_matches!(doc.encode_delta(&[0xff]), Err(NotebookError::Sync(_)));
        assert_eq!(doc.version(), 0);
    }
}
