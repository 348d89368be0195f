//! Commands offered by the cell palette and bound to global shortcuts.

use crate::{
    Cell, CellConstructor, CellConstructorRegistry, EditorConfig, EditorSession, KeyShortcut,
    ReplicatedDocument, ShortcutMap, Subscription,
};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// A palette entry
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub shortcut: Option<KeyShortcut>,
    on_complete: Rc<dyn Fn()>,
}

impl Command {
    fn from_constructor<T, F>(constructor: &CellConstructor<T>, on_complete: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            name: constructor.name.clone(),
            description: constructor.description.clone(),
            shortcut: constructor.shortcut.clone(),
            on_complete: Rc::new(on_complete),
        }
    }

    /// Run the command
    pub fn complete(&self) {
        (self.on_complete)()
    }
}

impl Clone for Command {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            shortcut: self.shortcut.clone(),
            on_complete: Rc::clone(&self.on_complete),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("shortcut", &self.shortcut)
            .finish()
    }
}

/// Commands that fill the active stem cell (or insert after the active cell)
pub fn insert_commands<T, D>(
    session: &EditorSession<T, D>,
    registry: &CellConstructorRegistry<T>,
) -> Vec<Command>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    registry
        .iter()
        .map(|constructor| {
            let session = session.clone();
            let cell_constructor = constructor.clone();
            Command::from_constructor(constructor, move || {
                if let Err(err) = session.add_or_replace_active_cell(cell_constructor.construct()) {
                    warn!(command = %cell_constructor.name, error = %err, "insert command failed");
                }
            })
        })
        .collect()
}

/// Commands that change the type of the cell at `index`
pub fn replace_commands<T, D>(
    session: &EditorSession<T, D>,
    registry: &CellConstructorRegistry<T>,
    index: usize,
) -> Vec<Command>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    registry
        .iter()
        .map(|constructor| {
            let session = session.clone();
            let cell_constructor = constructor.clone();
            Command::from_constructor(constructor, move || {
                if let Err(err) = session.replace_cell_with(index, cell_constructor.construct()) {
                    warn!(command = %cell_constructor.name, index, error = %err, "replace command failed");
                }
            })
        })
        .collect()
}

/// Bind one global shortcut per constructor plus the stem shortcut.
///
/// Bindings hold the session weakly and are released when the returned
/// subscriptions drop.
pub fn bind_shortcuts<T, D>(
    session: &EditorSession<T, D>,
    registry: &CellConstructorRegistry<T>,
    shortcuts: &ShortcutMap,
    config: &EditorConfig,
) -> Vec<Subscription>
where
    T: Clone + 'static,
    D: ReplicatedDocument<T> + 'static,
{
    if config.disable_shortcuts {
        debug!("shortcut registration disabled");
        return Vec::new();
    }

    let mut bindings = Vec::new();
    for constructor in registry.iter() {
        let Some(shortcut) = constructor.shortcut.clone() else {
            continue;
        };
        let weak = session.downgrade();
        let constructor = constructor.clone();
        bindings.push(shortcuts.bind(shortcut, move || {
            let Some(session) = weak.upgrade() else {
                return;
            };
            if let Err(err) = session.add_or_replace_active_cell(constructor.construct()) {
                warn!(command = %constructor.name, error = %err, "shortcut failed");
            }
        }));
    }

    let weak = session.downgrade();
    bindings.push(shortcuts.bind(config.stem_shortcut.clone(), move || {
        let Some(session) = weak.upgrade() else {
            return;
        };
        if let Err(err) = session.add_after_active_cell(Cell::stem()) {
            warn!(error = %err, "stem shortcut failed");
        }
    }));

    debug!(count = bindings.len(), "bound cell shortcuts");
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellKind, LocalDocument, Modifier, Notebook};
    use pretty_assertions::assert_eq;

    type Session = EditorSession<u32, LocalDocument<u32>>;

    fn registry() -> CellConstructorRegistry<u32> {
        CellConstructorRegistry::new(
            Modifier::Primary,
            vec![
                CellConstructor::new("Number", || Cell::formal(0))
                    .with_shortcut(KeyShortcut::new([Modifier::Primary], "N")),
                CellConstructor::new("Quiet", || Cell::formal(1)),
            ],
        )
    }

    fn session_with(cells: Vec<Cell<u32>>) -> Session {
        EditorSession::new(LocalDocument::with_notebook(Notebook::from_cells(cells).unwrap()).unwrap())
    }

    fn kinds(session: &Session) -> Vec<CellKind> {
        session.with_notebook(|nb| nb.iter().map(Cell::kind).collect())
    }

    #[test]
    fn test_insert_command_fills_stem() {
        let session = session_with(vec![Cell::stem()]);
        let commands = insert_commands(&session, &registry());
        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Text", "Number", "Quiet"]);

        commands[1].complete();
        assert_eq!(kinds(&session), vec![CellKind::Formal]);

        commands[0].complete();
        assert_eq!(kinds(&session), vec![CellKind::Formal, CellKind::RichText]);
        assert_eq!(session.active_cell(), Some(1));
    }

    #[test]
    fn test_replace_command() {
        let session = session_with(vec![Cell::stem(), Cell::stem()]);
        let commands = replace_commands(&session, &registry(), 1);

        commands[0].complete();
        assert_eq!(kinds(&session), vec![CellKind::Stem, CellKind::RichText]);
        assert_eq!(session.active_cell(), Some(0));
    }

    #[test]
    fn test_shortcuts_bound_per_constructor() {
        let session = session_with(vec![]);
        let shortcuts = ShortcutMap::new();
        let bindings = bind_shortcuts(&session, &registry(), &shortcuts, &EditorConfig::default());

        // Text, Number and the stem shortcut; "Quiet" has none
        assert_eq!(bindings.len(), 3);
        assert!(shortcuts.trigger(&"Primary+Enter".parse().unwrap()));
        assert!(shortcuts.trigger(&"Primary+N".parse().unwrap()));
        assert_eq!(kinds(&session), vec![CellKind::Formal]);

        drop(bindings);
        assert!(shortcuts.is_empty());
    }

    #[test]
    fn test_shortcuts_can_be_disabled() {
        let session = session_with(vec![]);
        let shortcuts = ShortcutMap::new();
        let config = EditorConfig {
            disable_shortcuts: true,
            ..EditorConfig::default()
        };

        assert!(bind_shortcuts(&session, &registry(), &shortcuts, &config).is_empty());
        assert!(shortcuts.is_empty());
    }

    #[test]
    fn test_shortcut_after_session_dropped() {
        let shortcuts = ShortcutMap::new();
        let bindings = {
            let session = session_with(vec![]);
            bind_shortcuts(&session, &registry(), &shortcuts, &EditorConfig::default())
        };
        assert!(shortcuts.trigger(&"Primary+T".parse().unwrap()));
        drop(bindings);
    }
}
