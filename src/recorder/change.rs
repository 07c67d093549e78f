// ============================================================================
// Property Change Records
// ============================================================================
//
// Implements the Command Pattern for reversible property mutations. Each
// PropertyChange holds the original a rollback must restore; ProposedChange
// is the borrowed view veto policies and listeners inspect before and after
// a mutation is applied.
//
// ============================================================================

use crate::core::Value;

/// The recorded original of a dirty property
///
/// Created on the first mutation of a property since the last commit or
/// rollback. Replayed (oldest value written back) during rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    property: String,
    old_value: Value,
}

impl PropertyChange {
    pub fn new(property: impl Into<String>, old_value: Value) -> Self {
        Self {
            property: property.into(),
            old_value,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn old_value(&self) -> &Value {
        &self.old_value
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.property, self.old_value)
    }
}

/// A mutation under consideration: property name, current value, candidate
/// value. Veto policies accept or reject it; nothing here mutates the entity.
#[derive(Debug, Clone, Copy)]
pub struct ProposedChange<'a> {
    pub property: &'a str,
    pub old_value: &'a Value,
    pub new_value: &'a Value,
}

impl<'a> ProposedChange<'a> {
    pub fn new(property: &'a str, old_value: &'a Value, new_value: &'a Value) -> Self {
        Self {
            property,
            old_value,
            new_value,
        }
    }

    /// Check if the candidate value actually differs from the current one
    pub fn is_noop(&self) -> bool {
        self.old_value == self.new_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_change_accessors() {
        let change = PropertyChange::new("name", Value::from("Alice"));
        assert_eq!(change.property(), "name");
        assert_eq!(change.old_value(), &Value::from("Alice"));
    }

    #[test]
    fn test_proposed_change_noop() {
        let old = Value::Integer(1);
        let same = Value::Integer(1);
        let diff = Value::Integer(2);
        assert!(ProposedChange::new("n", &old, &same).is_noop());
        assert!(!ProposedChange::new("n", &old, &diff).is_noop());
    }
}
