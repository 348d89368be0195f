//! # Notebook Editor
//!
//! Mounts an [`EditorSession`] into a host: registers the drag and drop
//! monitor, the text selection observer and the global shortcuts, and
//! releases all of them when the editor is unmounted or dropped.

use crate::{
    bind_shortcuts, insert_commands, is_cell_drag_data, replace_commands, CellConstructor,
    CellConstructorRegistry, Command, DragDropManager, EditorConfig, EditorSession,
    ReplicatedDocument, ShortcutMap, Subscription, TextSelectionSource,
};
use tracing::{info, warn};

/// Platform services an editor is mounted into
#[derive(Debug, Clone, Default)]
pub struct EditorHost {
    pub text_selection: TextSelectionSource,
    pub drag_drop: DragDropManager,
    pub shortcuts: ShortcutMap,
}

impl EditorHost {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A mounted notebook editor
pub struct NotebookEditor<T, D>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    session: EditorSession<T, D>,
    host: EditorHost,
    config: EditorConfig,
    registry: CellConstructorRegistry<T>,
    drag_monitor: Option<Subscription>,
    text_selection_observer: Option<Subscription>,
    shortcut_bindings: Vec<Subscription>,
}

impl<T, D> NotebookEditor<T, D>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    /// Mount an editor for `doc` into `host`
    pub fn mount(
        doc: D,
        host: &EditorHost,
        config: EditorConfig,
        constructors: Vec<CellConstructor<T>>,
    ) -> Self {
        let session = EditorSession::with_text_selection(doc, host.text_selection.clone());
        let registry = CellConstructorRegistry::new(config.cell_shortcut_modifier, constructors);

        let drag_monitor = {
            let weak = session.downgrade();
            let accepts = session.downgrade();
            host.drag_drop.monitor(
                move |source| {
                    is_cell_drag_data(source)
                        && accepts.upgrade().is_some_and(|s| s.is_droppable(source))
                },
                move |event| {
                    let Some(session) = weak.upgrade() else {
                        return;
                    };
                    if let Err(err) = session.handle_drop(event) {
                        warn!(error = %err, "drop failed");
                    }
                },
            )
        };

        let text_selection_observer = {
            let weak = session.downgrade();
            host.text_selection.subscribe(move |selection| {
                if let Some(session) = weak.upgrade() {
                    session.handle_text_selection(selection);
                }
            })
        };

        let shortcut_bindings = bind_shortcuts(&session, &registry, &host.shortcuts, &config);

        info!(
            doc = %session.handle(),
            cells = session.len(),
            shortcuts = shortcut_bindings.len(),
            "mounted notebook editor"
        );

        Self {
            session,
            host: host.clone(),
            config,
            registry,
            drag_monitor: Some(drag_monitor),
            text_selection_observer: Some(text_selection_observer),
            shortcut_bindings,
        }
    }

    pub fn session(&self) -> &EditorSession<T, D> {
        &self.session
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &CellConstructorRegistry<T> {
        &self.registry
    }

    /// Replace the formal constructors and rebind their shortcuts
    pub fn set_constructors(&mut self, constructors: Vec<CellConstructor<T>>) {
        self.shortcut_bindings.clear();
        self.registry = CellConstructorRegistry::new(self.config.cell_shortcut_modifier, constructors);
        self.shortcut_bindings =
            bind_shortcuts(&self.session, &self.registry, &self.host.shortcuts, &self.config);
    }

    /// Palette commands for an empty stem cell
    pub fn insert_commands(&self) -> Vec<Command> {
        insert_commands(&self.session, &self.registry)
    }

    /// Palette commands for changing the type of the cell at `index`
    pub fn replace_commands(&self, index: usize) -> Vec<Command> {
        replace_commands(&self.session, &self.registry, index)
    }

    /// Tear down the editor, releasing every host registration
    pub fn unmount(self) {
        drop(self);
    }
}

impl<T, D> Drop for NotebookEditor<T, D>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    fn drop(&mut self) {
        self.drag_monitor.take();
        self.text_selection_observer.take();
        self.shortcut_bindings.clear();
        info!(doc = %self.session.handle(), "unmounted notebook editor");
    }
}
