// Helper functions to build notebooks and sessions for integration tests

#![allow(dead_code)]

use notebook_editor::{
    cell_drag_data, Cell, CellConstructor, CellId, CellKind, ClosestEdge, DropEvent, DropTarget,
    EditorConfig, EditorHost, EditorSession, KeyShortcut, LocalDocument, Modifier, Notebook,
    NotebookEditor,
};

pub type Session = EditorSession<i64, LocalDocument<i64>>;
pub type Editor = NotebookEditor<i64, LocalDocument<i64>>;

/// A notebook of `n` formal cells holding 0..n
pub fn numbered_notebook(n: i64) -> Notebook<i64> {
    Notebook::from_cells((0..n).map(Cell::formal).collect()).unwrap()
}

/// A session over `numbered_notebook(n)`
pub fn numbered_session(n: i64) -> Session {
    EditorSession::new(LocalDocument::with_notebook(numbered_notebook(n)).unwrap())
}

pub fn empty_session() -> Session {
    EditorSession::new(LocalDocument::new())
}

/// The formal values of a session, `None` for stem and rich-text cells
pub fn values(session: &Session) -> Vec<Option<i64>> {
    session.with_notebook(|nb| nb.iter().map(|c| c.content.as_formal().copied()).collect())
}

pub fn kinds(session: &Session) -> Vec<CellKind> {
    session.with_notebook(|nb| nb.iter().map(Cell::kind).collect())
}

/// Constructor for an integer cell bound to `Primary+I`
pub fn integer_constructor() -> CellConstructor<i64> {
    CellConstructor::new("Integer", || Cell::formal(0))
        .with_description("Insert an integer")
        .with_shortcut(KeyShortcut::new([Modifier::Primary], "I"))
}

pub fn mount_editor(host: &EditorHost, config: EditorConfig) -> Editor {
    NotebookEditor::mount(LocalDocument::new(), host, config, vec![integer_constructor()])
}

/// Drop event dragging `source` onto `target`
pub fn drop_event(source: CellId, target: CellId, edge: Option<ClosestEdge>) -> DropEvent {
    DropEvent {
        source: cell_drag_data(source),
        target: Some(DropTarget {
            data: cell_drag_data(target),
            closest_edge: edge,
        }),
    }
}
