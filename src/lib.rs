// Notebook Editor - Core Library

pub mod cell;
pub mod commands;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod event;
pub mod host;
pub mod notebook;
pub mod observer;
pub mod registry;
pub mod reorder;
pub mod session;
pub mod shortcut;
pub mod state;
pub mod transaction;

// Re-export main types for convenience
pub use cell::{Cell, CellContent, CellId, CellKind};
pub use commands::{bind_shortcuts, insert_commands, replace_commands, Command};
pub use config::EditorConfig;
pub use document::{
    Commit, CommittedTransaction, DocHandle, DocPath, LocalDocument, ReplicatedDocument,
};
pub use editor::{EditorHost, NotebookEditor};
pub use error::NotebookError;
pub use event::{EditorEvent, EventType, Origin};
pub use host::{
    cell_drag_data, is_cell_drag_data, parse_cell_drag_data, DragData, DragDropManager,
    DropEvent, DropTarget, TextSelection, TextSelectionSource,
};
pub use notebook::Notebook;
pub use observer::{Observers, Subscription};
pub use registry::{rich_text_constructor, CellConstructor, CellConstructorRegistry};
pub use reorder::{reorder_destination, ClosestEdge, Reorder};
pub use session::{CellActions, CellBody, CellLabel, CellView, EditorSession, WeakEditorSession};
pub use shortcut::{KeyShortcut, Modifier, ShortcutMap, ShortcutParseError};
pub use state::{CellsState, Transition};
pub use transaction::{NotebookChange, Transaction};
