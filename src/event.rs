use crate::CellId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An editor event with timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventType,
}

impl EditorEvent {
    /// Create a new event with the current timestamp
    pub fn new(event: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Create a new event with a specific timestamp
    pub fn with_timestamp(timestamp: DateTime<Utc>, event: EventType) -> Self {
        Self { timestamp, event }
    }
}

/// Where a committed transaction came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Types of events observers are notified about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EventType {
    /// A transaction was committed to the document
    DocumentChanged {
        version: u64,
        origin: Origin,
        changes: usize,
    },

    ActiveCellChanged {
        active: Option<usize>,
    },

    SelectionChanged {
        selected: Vec<CellId>,
    },
}
