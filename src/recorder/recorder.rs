// ============================================================================
// Change Recorder
// ============================================================================

use std::collections::BTreeMap;

use log::debug;

use crate::core::Value;
use crate::recorder::PropertyChange;

/// Per-entity record of uncommitted property changes
///
/// Maps property name to the last-committed value, populated lazily on the
/// first mutation of each property since the last commit or rollback.
///
/// A property appears here iff it was touched since the last commit or
/// rollback. Touched means dirty: mutating a property back to its original
/// value before commit does not undo the record.
///
/// # Thread Safety
/// Owned by a single entity; no internal synchronization. Callers serialize
/// access to the owning entity externally.
#[derive(Debug, Default, Clone)]
pub struct ChangeRecorder {
    originals: BTreeMap<String, Value>,
}

impl ChangeRecorder {
    pub fn new() -> Self {
        Self {
            originals: BTreeMap::new(),
        }
    }

    /// Check if any property carries an uncommitted change
    pub fn has_modified_properties(&self) -> bool {
        !self.originals.is_empty()
    }

    /// Check if the named property carries an uncommitted change
    pub fn contains(&self, property: &str) -> bool {
        self.originals.contains_key(property)
    }

    /// Names of all dirty properties, sorted
    pub fn modified_properties(&self) -> Vec<String> {
        self.originals.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// Record the pre-change value on the property's first touch
    ///
    /// First-touch-wins: a second mutation of the same property before
    /// commit does not overwrite the recorded original.
    pub fn record_if_absent(&mut self, property: &str, old_value: Value) {
        self.originals
            .entry(property.to_string())
            .or_insert(old_value);
    }

    /// The recorded original for a dirty property, if any
    pub fn original(&self, property: &str) -> Option<&Value> {
        self.originals.get(property)
    }

    /// Make all pending changes permanent by dropping their records
    pub fn commit(&mut self) {
        debug!(
            "recorder commit: {} propert{} made permanent",
            self.originals.len(),
            if self.originals.len() == 1 { "y" } else { "ies" }
        );
        self.originals.clear();
    }

    /// Drain all recorded originals in name-sorted order for replay
    ///
    /// The entity writes these back through its raw-apply primitive,
    /// bypassing validation: replay is an undo, not a new edit.
    pub fn take_for_rollback(&mut self) -> Vec<PropertyChange> {
        let drained: Vec<PropertyChange> = std::mem::take(&mut self.originals)
            .into_iter()
            .map(|(name, value)| PropertyChange::new(name, value))
            .collect();
        debug!("recorder rollback: replaying {} change(s)", drained.len());
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let mut recorder = ChangeRecorder::new();
        assert!(!recorder.has_modified_properties());

        recorder.record_if_absent("name", Value::from("Alice"));
        assert!(recorder.has_modified_properties());
        assert!(recorder.contains("name"));
        assert!(!recorder.contains("code"));
        assert_eq!(recorder.modified_properties(), vec!["name".to_string()]);
    }

    #[test]
    fn test_first_touch_wins() {
        let mut recorder = ChangeRecorder::new();
        recorder.record_if_absent("name", Value::from("Alice"));
        recorder.record_if_absent("name", Value::from("Bob"));
        assert_eq!(recorder.original("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_commit_clears() {
        let mut recorder = ChangeRecorder::new();
        recorder.record_if_absent("a", Value::Integer(1));
        recorder.record_if_absent("b", Value::Integer(2));
        recorder.commit();
        assert!(recorder.is_empty());
        assert!(!recorder.contains("a"));
    }

    #[test]
    fn test_rollback_drains_sorted() {
        let mut recorder = ChangeRecorder::new();
        recorder.record_if_absent("zeta", Value::Integer(1));
        recorder.record_if_absent("alpha", Value::Integer(2));
        recorder.record_if_absent("mid", Value::Integer(3));

        let drained = recorder.take_for_rollback();
        let names: Vec<&str> = drained.iter().map(|c| c.property()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert!(recorder.is_empty());
    }
}
