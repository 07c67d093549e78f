use std::collections::{BTreeMap, BTreeSet};

use crate::core::{EntityError, Result};
use crate::recorder::ProposedChange;
use crate::validation::Bound;

/// Entity-level flag snapshot handed to policies alongside the change
///
/// Keeps policies unit-testable: they see (name, old, new) plus this copied
/// pair, never the full entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityFlags {
    /// Rollback has been invoked and not yet reset
    pub rolled_back: bool,
    /// Entity policy: mutations after rollback are rejected
    pub reject_after_rollback: bool,
}

/// A veto over a proposed property change
///
/// Policies are pure decision functions: they accept or reject, and never
/// mutate entity state. Registration order is fixed at entity construction
/// and short-circuits on the first rejection.
pub trait VetoPolicy {
    fn name(&self) -> &'static str;

    fn check(&self, change: &ProposedChange<'_>, flags: &EntityFlags) -> Result<()>;
}

/// Rejects every mutation once rollback has been invoked, when the entity is
/// configured to reject post-rollback edits. Registered first so it
/// short-circuits ahead of bounds checks.
#[derive(Debug, Default)]
pub struct RollbackGuard;

impl VetoPolicy for RollbackGuard {
    fn name(&self) -> &'static str {
        "rollback_guard"
    }

    fn check(&self, change: &ProposedChange<'_>, flags: &EntityFlags) -> Result<()> {
        if flags.rolled_back && flags.reject_after_rollback {
            return Err(EntityError::constraint(
                change.property,
                "entity was rolled back; call reset() before mutating again",
            ));
        }
        Ok(())
    }
}

/// Rejects setting a designated property to an absent or empty value
#[derive(Debug, Default)]
pub struct RequiredGuard {
    properties: BTreeSet<String>,
}

impl RequiredGuard {
    pub fn new(properties: impl IntoIterator<Item = String>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.properties.contains(property)
    }
}

impl VetoPolicy for RequiredGuard {
    fn name(&self) -> &'static str {
        "required_guard"
    }

    fn check(&self, change: &ProposedChange<'_>, _flags: &EntityFlags) -> Result<()> {
        if self.properties.contains(change.property) && change.new_value.is_empty() {
            return Err(EntityError::constraint(change.property, "value is required"));
        }
        Ok(())
    }
}

/// Applies declared bounds to the proposed new value
///
/// Bound declarations are a declarative map from property name to bound
/// descriptors; properties without declarations pass unchecked.
#[derive(Debug, Default)]
pub struct BoundsGuard {
    bounds: BTreeMap<String, Vec<Bound>>,
}

impl BoundsGuard {
    pub fn new(bounds: BTreeMap<String, Vec<Bound>>) -> Self {
        Self { bounds }
    }

    pub fn bounds_for(&self, property: &str) -> &[Bound] {
        self.bounds.get(property).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl VetoPolicy for BoundsGuard {
    fn name(&self) -> &'static str {
        "bounds_guard"
    }

    fn check(&self, change: &ProposedChange<'_>, _flags: &EntityFlags) -> Result<()> {
        if let Some(declared) = self.bounds.get(change.property) {
            for bound in declared {
                bound.check(change.property, change.new_value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn change<'a>(property: &'a str, old: &'a Value, new: &'a Value) -> ProposedChange<'a> {
        ProposedChange::new(property, old, new)
    }

    #[test]
    fn test_rollback_guard_respects_policy() {
        let guard = RollbackGuard;
        let old = Value::Null;
        let new = Value::Integer(1);

        let rejecting = EntityFlags {
            rolled_back: true,
            reject_after_rollback: true,
        };
        assert!(guard.check(&change("n", &old, &new), &rejecting).is_err());

        let permitting = EntityFlags {
            rolled_back: true,
            reject_after_rollback: false,
        };
        assert!(guard.check(&change("n", &old, &new), &permitting).is_ok());

        let clean = EntityFlags::default();
        assert!(guard.check(&change("n", &old, &new), &clean).is_ok());
    }

    #[test]
    fn test_required_guard_targets_listed_properties() {
        let guard = RequiredGuard::new(["name".to_string()]);
        let old = Value::from("Alice");
        let null = Value::Null;
        let other = Value::Null;

        assert!(
            guard
                .check(&change("name", &old, &null), &EntityFlags::default())
                .is_err()
        );
        // Unlisted properties may be cleared freely
        assert!(
            guard
                .check(&change("nickname", &old, &other), &EntityFlags::default())
                .is_ok()
        );
    }

    #[test]
    fn test_bounds_guard_checks_declared_only() {
        let mut bounds = BTreeMap::new();
        bounds.insert("code".to_string(), vec![Bound::max_length(5)]);
        let guard = BoundsGuard::new(bounds);

        let old = Value::Null;
        let long = Value::from("ABCDEF");
        let fits = Value::from("ABCDE");

        assert!(
            guard
                .check(&change("code", &old, &long), &EntityFlags::default())
                .is_err()
        );
        assert!(
            guard
                .check(&change("code", &old, &fits), &EntityFlags::default())
                .is_ok()
        );
        // No declaration, no check
        assert!(
            guard
                .check(&change("memo", &old, &long), &EntityFlags::default())
                .is_ok()
        );
    }
}
