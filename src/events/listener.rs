use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::Value;

/// Global listener ID counter
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for a registered listener, used for symmetric removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener_{}", self.0)
    }
}

/// Fired after a single property mutation succeeds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyEvent {
    pub property: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl PropertyEvent {
    pub fn new(property: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            property: property.into(),
            old_value,
            new_value,
        }
    }
}

/// Fired once per external mutation call that left the entity modified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateEvent {
    /// Number of properties currently dirty
    pub modified_count: usize,
}

pub type PropertyListener = Box<dyn FnMut(&PropertyEvent)>;
pub type StateListener = Box<dyn FnMut(&StateEvent)>;
