use crate::Subscription;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use thiserror::Error;

/// Modifier key of a shortcut. `Primary` is Ctrl or Cmd depending on platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Primary,
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl FromStr for Modifier {
    type Err = ShortcutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "mod" => Ok(Modifier::Primary),
            "ctrl" | "control" => Ok(Modifier::Ctrl),
            "alt" | "option" => Ok(Modifier::Alt),
            "shift" => Ok(Modifier::Shift),
            "meta" | "cmd" | "super" => Ok(Modifier::Meta),
            _ => Err(ShortcutParseError::UnknownModifier(s.to_string())),
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modifier::Primary => "Primary",
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Meta => "Meta",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortcutParseError {
    #[error("Shortcut has no key")]
    MissingKey,

    #[error("Unknown modifier: {0}")]
    UnknownModifier(String),
}

/// A key chord such as `Primary+Shift+T`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyShortcut {
    modifiers: BTreeSet<Modifier>,
    key: String,
}

impl KeyShortcut {
    pub fn new<I>(modifiers: I, key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Modifier>,
    {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key: key.into(),
        }
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FromStr for KeyShortcut {
    type Err = ShortcutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(ShortcutParseError::MissingKey),
        };
        let modifiers = parts
            .into_iter()
            .map(Modifier::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { modifiers, key })
    }
}

impl TryFrom<String> for KeyShortcut {
    type Error = ShortcutParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyShortcut> for String {
    fn from(shortcut: KeyShortcut) -> Self {
        shortcut.to_string()
    }
}

impl fmt::Display for KeyShortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier)?;
        }
        f.write_str(&self.key)
    }
}

type Action = Rc<dyn Fn()>;

#[derive(Default)]
struct Bindings {
    next_id: u64,
    by_shortcut: HashMap<KeyShortcut, Vec<(u64, Action)>>,
}

/// Global shortcut table of the host. The most recent binding of a chord wins
#[derive(Clone, Default)]
pub struct ShortcutMap {
    inner: Rc<RefCell<Bindings>>,
}

impl ShortcutMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` to `shortcut` until the subscription drops
    pub fn bind<F>(&self, shortcut: KeyShortcut, action: F) -> Subscription
    where
        F: Fn() + 'static,
    {
        let id = {
            let mut bindings = self.inner.borrow_mut();
            let id = bindings.next_id;
            bindings.next_id += 1;
            let action: Action = Rc::new(action);
            bindings
                .by_shortcut
                .entry(shortcut.clone())
                .or_default()
                .push((id, action));
            id
        };

        let weak: Weak<RefCell<Bindings>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut bindings = inner.borrow_mut();
                if let Some(actions) = bindings.by_shortcut.get_mut(&shortcut) {
                    actions.retain(|(entry, _)| *entry != id);
                    if actions.is_empty() {
                        bindings.by_shortcut.remove(&shortcut);
                    }
                }
            }
        })
    }

    /// Run the action bound to `shortcut`. Returns false if nothing is bound
    pub fn trigger(&self, shortcut: &KeyShortcut) -> bool {
        let action = self
            .inner
            .borrow()
            .by_shortcut
            .get(shortcut)
            .and_then(|actions| actions.last())
            .map(|(_, action)| Rc::clone(action));

        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn is_bound(&self, shortcut: &KeyShortcut) -> bool {
        self.inner.borrow().by_shortcut.contains_key(shortcut)
    }

    /// Number of bound chords
    pub fn len(&self) -> usize {
        self.inner.borrow().by_shortcut.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ShortcutMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.inner.borrow();
        let mut chords: Vec<String> = bindings.by_shortcut.keys().map(|s| s.to_string()).collect();
        chords.sort();
        f.debug_struct("ShortcutMap").field("bound", &chords).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn test_parse_shortcut() {
        let shortcut: KeyShortcut = "Shift+Primary+T".parse().unwrap();
        assert_eq!(shortcut.key(), "T");
        assert!(shortcut.modifiers().contains(&Modifier::Shift));
        assert_eq!(shortcut.to_string(), "Primary+Shift+T");

        assert_eq!("Enter".parse::<KeyShortcut>().unwrap().key(), "Enter");
        assert_eq!(
            "Hyper+T".parse::<KeyShortcut>(),
            Err(ShortcutParseError::UnknownModifier("Hyper".to_string()))
        );
        assert_eq!("Primary+".parse::<KeyShortcut>(), Err(ShortcutParseError::MissingKey));
    }

    #[test]
    fn test_shortcut_serializes_as_string() {
        let shortcut = KeyShortcut::new([Modifier::Primary], "Enter");
        let json = serde_json::to_string(&shortcut).unwrap();
        assert_eq!(json, "\"Primary+Enter\"");
        let back: KeyShortcut = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shortcut);
    }

    #[test]
    fn test_bind_and_trigger() {
        let map = ShortcutMap::new();
        let hits = Rc::new(StdCell::new(0));
        let shortcut = KeyShortcut::new([Modifier::Primary], "T");

        let binding = {
            let hits = Rc::clone(&hits);
            map.bind(shortcut.clone(), move || hits.set(hits.get() + 1))
        };
        assert!(map.trigger(&shortcut));
        assert_eq!(hits.get(), 1);

        drop(binding);
        assert!(!map.trigger(&shortcut));
        assert!(map.is_empty());
    }

    #[test]
    fn test_latest_binding_wins() {
        let map = ShortcutMap::new();
        let last = Rc::new(StdCell::new(""));
        let shortcut = KeyShortcut::new([Modifier::Alt], "X");

        let first = {
            let last = Rc::clone(&last);
            map.bind(shortcut.clone(), move || last.set("first"))
        };
        let second = {
            let last = Rc::clone(&last);
            map.bind(shortcut.clone(), move || last.set("second"))
        };

        map.trigger(&shortcut);
        assert_eq!(last.get(), "second");

        drop(second);
        map.trigger(&shortcut);
        assert_eq!(last.get(), "first");
        drop(first);
    }
}
