use crate::{Cell, KeyShortcut, Modifier};
use std::fmt;
use std::rc::Rc;

/// A kind of cell that can be inserted into a notebook
pub struct CellConstructor<T> {
    pub name: String,
    pub description: Option<String>,
    pub shortcut: Option<KeyShortcut>,
    construct: Rc<dyn Fn() -> Cell<T>>,
}

impl<T> CellConstructor<T> {
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn() -> Cell<T> + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            shortcut: None,
            construct: Rc::new(construct),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_shortcut(mut self, shortcut: KeyShortcut) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    /// Build a new cell with a fresh ID
    pub fn construct(&self) -> Cell<T> {
        (self.construct)()
    }
}

impl<T> Clone for CellConstructor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            shortcut: self.shortcut.clone(),
            construct: Rc::clone(&self.construct),
        }
    }
}

impl<T> fmt::Debug for CellConstructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellConstructor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("shortcut", &self.shortcut)
            .finish()
    }
}

/// Built-in constructor for rich-text cells, bound to `<modifier>+T`
pub fn rich_text_constructor<T: 'static>(modifier: Modifier) -> CellConstructor<T> {
    CellConstructor::new("Text", Cell::rich_text)
        .with_description("Start writing text")
        .with_shortcut(KeyShortcut::new([modifier], "T"))
}

/// Every kind of cell available in an editor: the built-in rich-text
/// constructor followed by the caller's formal constructors
#[derive(Debug, Clone)]
pub struct CellConstructorRegistry<T> {
    constructors: Vec<CellConstructor<T>>,
}

impl<T: 'static> CellConstructorRegistry<T> {
    pub fn new(modifier: Modifier, formal: Vec<CellConstructor<T>>) -> Self {
        let mut constructors = Vec::with_capacity(formal.len() + 1);
        constructors.push(rich_text_constructor(modifier));
        constructors.extend(formal);
        Self { constructors }
    }

    pub fn constructors(&self) -> &[CellConstructor<T>] {
        &self.constructors
    }

    pub fn get(&self, name: &str) -> Option<&CellConstructor<T>> {
        self.constructors.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CellConstructor<T>> {
        self.constructors.iter()
    }
}
