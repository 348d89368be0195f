//! Host platform services the editor talks to: native text selection and
//! drag and drop. The concrete types here are in-process implementations;
//! an embedding UI forwards its platform events into them.

use crate::{CellId, ClosestEdge, Observers, Subscription};
use serde_json::{Map, Value};
use std::cell::Cell as StdCell;
use std::rc::Rc;
use std::str::FromStr;
use ulid::Ulid;

// ========== Text Selection ==========

/// Native text selection reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextSelection {
    pub anchor: usize,
    pub focus: usize,
}

impl TextSelection {
    pub fn caret(at: usize) -> Self {
        Self {
            anchor: at,
            focus: at,
        }
    }

    pub fn range(anchor: usize, focus: usize) -> Self {
        Self { anchor, focus }
    }

    /// True for a non-empty range, false for a caret
    pub fn is_range(&self) -> bool {
        self.anchor != self.focus
    }
}

/// Source of native text selection changes
#[derive(Debug, Clone, Default)]
pub struct TextSelectionSource {
    current: Rc<StdCell<Option<TextSelection>>>,
    observers: Observers<TextSelection>,
}

impl TextSelectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<TextSelection> {
        self.current.get()
    }

    /// Host reports a selection change
    pub fn select(&self, selection: TextSelection) {
        self.current.set(Some(selection));
        self.observers.notify(&selection);
    }

    /// Cancel any in-progress text selection
    pub fn clear(&self) {
        if self.current.take().is_some() {
            self.observers.notify(&TextSelection::default());
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&TextSelection) + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

// ========== Drag and Drop ==========

/// Payload attached to a drag source or drop target
pub type DragData = Map<String, Value>;

const CELL_DRAG_KEY: &str = "notebookCell";
const CELL_ID_KEY: &str = "cellId";

/// Payload exposed by a draggable notebook cell
pub fn cell_drag_data(id: CellId) -> DragData {
    let mut data = DragData::new();
    data.insert(CELL_DRAG_KEY.to_string(), Value::Bool(true));
    data.insert(CELL_ID_KEY.to_string(), Value::String(id.to_string()));
    data
}

/// Cell ID carried by a notebook cell payload, `None` for any other shape
pub fn parse_cell_drag_data(data: &DragData) -> Option<CellId> {
    if data.get(CELL_DRAG_KEY) != Some(&Value::Bool(true)) {
        return None;
    }
    let id = data.get(CELL_ID_KEY)?.as_str()?;
    Ulid::from_str(id).ok()
}

pub fn is_cell_drag_data(data: &DragData) -> bool {
    parse_cell_drag_data(data).is_some()
}

/// Where something was dropped
#[derive(Debug, Clone, PartialEq)]
pub struct DropTarget {
    pub data: DragData,

    /// Edge of the target's hit-box nearest the pointer
    pub closest_edge: Option<ClosestEdge>,
}

/// A completed drag gesture
#[derive(Debug, Clone, PartialEq)]
pub struct DropEvent {
    pub source: DragData,

    /// Innermost drop target, `None` when dropped outside any target
    pub target: Option<DropTarget>,
}

/// Drag and drop monitor registry of the host
#[derive(Debug, Clone, Default)]
pub struct DragDropManager {
    monitors: Observers<DropEvent>,
}

impl DragDropManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch drops whose source payload satisfies `can_monitor`
    pub fn monitor<P, F>(&self, can_monitor: P, mut on_drop: F) -> Subscription
    where
        P: Fn(&DragData) -> bool + 'static,
        F: FnMut(&DropEvent) + 'static,
    {
        self.monitors.subscribe(move |event: &DropEvent| {
            if can_monitor(&event.source) {
                on_drop(event);
            }
        })
    }

    /// Host reports a finished drop
    pub fn drop_on(&self, event: DropEvent) {
        self.monitors.notify(&event);
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn test_cell_drag_data_roundtrip() {
        let id = Ulid::new();
        assert_eq!(parse_cell_drag_data(&cell_drag_data(id)), Some(id));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        let id = Ulid::new().to_string();
        let cases = [
            json!({}),
            json!({ "cellId": id }),
            json!({ "notebookCell": false, "cellId": id }),
            json!({ "notebookCell": true }),
            json!({ "notebookCell": true, "cellId": 12 }),
            json!({ "notebookCell": true, "cellId": "not-a-ulid" }),
        ];
        for case in cases {
            let data = case.as_object().unwrap().clone();
            assert!(!is_cell_drag_data(&data), "accepted {:?}", data);
        }
    }

    #[test]
    fn test_monitor_filters_sources() {
        let manager = DragDropManager::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _monitor = {
            let seen = Rc::clone(&seen);
            manager.monitor(is_cell_drag_data, move |event| {
                seen.borrow_mut().push(parse_cell_drag_data(&event.source));
            })
        };

        let id = Ulid::new();
        manager.drop_on(DropEvent {
            source: DragData::new(),
            target: None,
        });
        manager.drop_on(DropEvent {
            source: cell_drag_data(id),
            target: None,
        });

        assert_eq!(*seen.borrow(), vec![Some(id)]);
    }

    #[test]
    fn test_text_selection_source() {
        let source = TextSelectionSource::new();
        let ranges = Rc::new(StdCell::new(0));
        let _sub = {
            let ranges = Rc::clone(&ranges);
            source.subscribe(move |sel| {
                if sel.is_range() {
                    ranges.set(ranges.get() + 1);
                }
            })
        };

        source.select(TextSelection::caret(3));
        source.select(TextSelection::range(1, 4));
        assert_eq!(ranges.get(), 1);

        source.clear();
        assert_eq!(source.current(), None);
        assert_eq!(ranges.get(), 1);
    }
}
