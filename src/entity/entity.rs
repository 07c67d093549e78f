// ============================================================================
// Entity
// ============================================================================

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::Serialize;

use crate::core::{EntityError, EntityKey, Result, Value, properties};
use crate::entity::builder::EntityDescriptor;
use crate::entity::{AuditSource, AuditStamp, AuditTrail, EntityBuilder, RollbackPolicy};
use crate::events::{
    ListenerId, NotificationBus, PropertyEvent, PropertyListener, StateEvent, StateListener,
};
use crate::history::HistoryId;
use crate::recorder::{ChangeRecorder, ProposedChange};
use crate::validation::EntityFlags;

/// Restores the dispatch switch to its prior value on every exit path,
/// including panics. Nesting is safe: each guard remembers what it saw.
struct DispatchGuard {
    switch: Rc<Cell<bool>>,
    prev: bool,
}

impl DispatchGuard {
    fn suppress(switch: Rc<Cell<bool>>) -> Self {
        let prev = switch.get();
        switch.set(false);
        Self { switch, prev }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.switch.set(self.prev);
    }
}

/// The mutable domain object
///
/// Owns its identity, audit metadata, a change recorder, a validation chain
/// (shared through the descriptor), and a notification bus. Mutation routes
/// through `set`, which validates, applies, records, and notifies in that
/// order; `commit` makes pending changes permanent and `rollback` replays
/// the recorded originals.
///
/// # Thread Safety
/// Single-threaded per instance: `&mut self` enforces exclusive access and
/// there is no internal locking. Callers sharing an entity across threads
/// must serialize access externally.
pub struct Entity {
    descriptor: Rc<EntityDescriptor>,
    audit_source: Rc<dyn AuditSource>,
    key: Option<EntityKey>,
    values: BTreeMap<String, Value>,
    audit: AuditTrail,
    mutable: bool,
    rolled_back: bool,
    dispatch: Rc<Cell<bool>>,
    recorder: ChangeRecorder,
    bus: NotificationBus,
    history: Option<HistoryId>,
}

#[derive(Serialize)]
struct EntitySnapshot<'a> {
    entity_type: &'a str,
    key: Option<EntityKey>,
    values: &'a BTreeMap<String, Value>,
    audit: &'a AuditTrail,
}

impl Entity {
    /// Start declaring a new entity type
    pub fn builder(type_name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(type_name)
    }

    /// Instantiate a fresh, unmodified entity: no key, defaults seeded,
    /// empty recorder and bus
    pub(crate) fn instantiate(
        descriptor: Rc<EntityDescriptor>,
        audit_source: Rc<dyn AuditSource>,
    ) -> Result<Self> {
        let stamp = AuditStamp::new(audit_source.current_actor(), audit_source.now());
        let defaults: Vec<(String, Value)> = descriptor
            .defaults()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        let mut entity = Self {
            descriptor,
            audit_source,
            key: None,
            values: BTreeMap::new(),
            audit: AuditTrail::new(stamp),
            mutable: true,
            rolled_back: false,
            dispatch: Rc::new(Cell::new(true)),
            recorder: ChangeRecorder::new(),
            bus: NotificationBus::new(),
            history: None,
        };

        for (name, value) in defaults {
            entity.apply_raw(&name, value).map_err(|e| {
                EntityError::InstantiationFailure(format!(
                    "seeding default for '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(entity)
    }

    // ------------------------------------------------------------------
    // Mutation pipeline
    // ------------------------------------------------------------------

    /// Mutate a property through the full pipeline
    ///
    /// Order: immutability check, validation chain, apply, first-touch
    /// recording, property listeners, state listeners. Any veto aborts the
    /// whole call before any state changes; the error names the property
    /// and the veto reason.
    pub fn set(&mut self, property: &str, new_value: impl Into<Value>) -> Result<()> {
        let new_value = new_value.into();

        if property != properties::KEY && !self.descriptor.declares(property) {
            return Err(EntityError::UnknownProperty(property.to_string()));
        }

        // Immutability is enforced ahead of the chain so reordering
        // policies can never bypass it
        if !self.mutable {
            return Err(EntityError::IllegalState(format!(
                "entity '{}' is immutable",
                self.descriptor.type_name()
            )));
        }

        let old_value = self.read(property);
        let flags = self.flags();
        let change = ProposedChange::new(property, &old_value, &new_value);
        self.descriptor.chain().check_all(&change, &flags)?;

        self.apply_raw(property, new_value.clone())?;
        self.recorder.record_if_absent(property, old_value.clone());
        self.audit.touch(self.stamp());

        if self.dispatch.get() {
            let event = PropertyEvent::new(property, old_value, new_value);
            self.bus.fire_property(&event);
            if self.is_modified() {
                self.bus.fire_state(&StateEvent {
                    modified_count: self.recorder.len(),
                });
            }
        }

        Ok(())
    }

    /// Assign the entity key through the pipeline; key assignment is
    /// tracked and undoable like any other property
    pub fn set_key(&mut self, key: EntityKey) -> Result<()> {
        self.set(properties::KEY, Value::Key(key))
    }

    /// Write a value straight onto the backing field
    ///
    /// No validation, no recording, no notification. Rollback replay and
    /// default seeding come through here: both are restorations, not edits.
    fn apply_raw(&mut self, property: &str, value: Value) -> Result<()> {
        if property == properties::KEY {
            self.key = value.as_key()?;
            return Ok(());
        }
        if value.is_null() {
            self.values.remove(property);
        } else {
            self.values.insert(property.to_string(), value);
        }
        Ok(())
    }

    /// Current value of a property as the pipeline sees it
    fn read(&self, property: &str) -> Value {
        if property == properties::KEY {
            return self.key.map(Value::Key).unwrap_or(Value::Null);
        }
        self.values.get(property).cloned().unwrap_or(Value::Null)
    }

    fn stamp(&self) -> AuditStamp {
        AuditStamp::new(self.audit_source.current_actor(), self.audit_source.now())
    }

    fn flags(&self) -> EntityFlags {
        EntityFlags {
            rolled_back: self.rolled_back,
            reject_after_rollback: self.descriptor.rollback_policy()
                == RollbackPolicy::RejectMutations,
        }
    }

    // ------------------------------------------------------------------
    // Commit / rollback lifecycle
    // ------------------------------------------------------------------

    /// Make all pending property changes permanent
    ///
    /// Drops every recorded original and promotes the working audit pair to
    /// the committed last-modified pair.
    pub fn commit(&mut self) {
        debug!(
            "entity '{}' commit: {:?}",
            self.descriptor.type_name(),
            self.recorder.modified_properties()
        );
        self.recorder.commit();
        self.audit.promote();
    }

    /// Undo all pending property changes
    ///
    /// Sets the rollback flag, suppresses notification for the duration
    /// (restored on every exit path), and replays recorded originals in
    /// name-sorted order through the raw-apply primitive, bypassing
    /// validation. The working audit pair is discarded.
    ///
    /// # Errors
    /// `IllegalState` if the entity has no pending changes.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.recorder.has_modified_properties() {
            return Err(EntityError::IllegalState(format!(
                "rollback on '{}' with no pending changes",
                self.descriptor.type_name()
            )));
        }

        debug!(
            "entity '{}' rollback: {:?}",
            self.descriptor.type_name(),
            self.recorder.modified_properties()
        );

        self.rolled_back = true;
        let _guard = DispatchGuard::suppress(self.dispatch.clone());

        for change in self.recorder.take_for_rollback() {
            let (name, value) = change.into_parts();
            self.apply_raw(&name, value)?;
        }

        self.audit.discard_working();
        Ok(())
    }

    /// Clear only the rollback flag, allowing mutation again under
    /// `RollbackPolicy::RejectMutations`. Pending-change records are
    /// untouched.
    pub fn reset(&mut self) {
        self.rolled_back = false;
    }

    // ------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn key(&self) -> Option<EntityKey> {
        self.key
    }

    /// An entity without a key has never been persisted
    pub fn is_new(&self) -> bool {
        self.key.is_none()
    }

    pub fn is_modified(&self) -> bool {
        self.recorder.has_modified_properties()
    }

    pub fn modified_properties(&self) -> Vec<String> {
        self.recorder.modified_properties()
    }

    /// The recorded pre-change value of a dirty property
    pub fn original_value(&self, property: &str) -> Option<&Value> {
        self.recorder.original(property)
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable = mutable;
    }

    pub fn was_rolled_back(&self) -> bool {
        self.rolled_back
    }

    pub fn is_dispatch_enabled(&self) -> bool {
        self.dispatch.get()
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn history_id(&self) -> Option<HistoryId> {
        self.history
    }

    pub(crate) fn set_history(&mut self, history: Option<HistoryId>) {
        self.history = history;
    }

    /// Check membership in any history container
    pub fn in_history(&self) -> bool {
        self.history.is_some()
    }

    // ------------------------------------------------------------------
    // Listener registration (delegates to the notification bus)
    // ------------------------------------------------------------------

    pub fn add_property_listener(&mut self, listener: PropertyListener) -> ListenerId {
        self.bus.add_property_listener(listener)
    }

    pub fn add_named_property_listener(
        &mut self,
        property: impl Into<String>,
        listener: PropertyListener,
    ) -> ListenerId {
        self.bus.add_named_property_listener(property, listener)
    }

    pub fn add_state_listener(&mut self, listener: StateListener) -> ListenerId {
        self.bus.add_state_listener(listener)
    }

    pub fn remove_property_listener(&mut self, id: ListenerId) -> bool {
        self.bus.remove_property_listener(id)
    }

    pub fn remove_state_listener(&mut self, id: ListenerId) -> bool {
        self.bus.remove_state_listener(id)
    }

    // ------------------------------------------------------------------
    // Copy & snapshot
    // ------------------------------------------------------------------

    /// Produce a detached duplicate
    ///
    /// The copy shares the descriptor and carries the current property
    /// values, but has no key, no history membership, no pending changes,
    /// no listeners, a fresh audit trail, and is mutable.
    ///
    /// # Errors
    /// `InstantiationFailure` if a fresh instance cannot be constructed;
    /// logged with its cause.
    pub fn copy(&self) -> Result<Entity> {
        let mut copy = Entity::instantiate(self.descriptor.clone(), self.audit_source.clone())
            .inspect_err(|e| {
                warn!(
                    "copy of entity '{}' failed: {}",
                    self.descriptor.type_name(),
                    e
                )
            })?;
        copy.values = self.values.clone();
        Ok(copy)
    }

    /// Serializable snapshot of identity, values, and audit trail
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let snapshot = EntitySnapshot {
            entity_type: self.descriptor.type_name(),
            key: self.key,
            values: &self.values,
            audit: &self.audit,
        };
        serde_json::to_value(&snapshot).map_err(|e| EntityError::Serialization(e.to_string()))
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.descriptor.type_name())
            .field("key", &self.key)
            .field("values", &self.values)
            .field("modified", &self.recorder.modified_properties())
            .field("mutable", &self.mutable)
            .field("rolled_back", &self.rolled_back)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Bound;
    use std::cell::RefCell;

    fn person() -> Entity {
        Entity::builder("person")
            .property("name", vec![Bound::Required])
            .property("code", vec![Bound::max_length(5)])
            .property("age", vec![Bound::int_range(0, 150)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_set_marks_modified() {
        let mut entity = person();
        entity.set("name", "Alice").unwrap();
        assert!(entity.is_modified());
        assert_eq!(entity.modified_properties(), vec!["name".to_string()]);
        assert_eq!(entity.get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let mut entity = person();
        let err = entity.set("salary", 10i64).unwrap_err();
        assert!(matches!(err, EntityError::UnknownProperty(_)));
        assert!(!entity.is_modified());
    }

    #[test]
    fn test_immutable_entity_fails_before_validation() {
        let mut entity = person();
        entity.set_mutable(false);
        // A value the bounds guard would also reject: the immutability
        // failure must win because it runs ahead of the chain
        let err = entity.set("code", "ABCDEF").unwrap_err();
        assert!(matches!(err, EntityError::IllegalState(_)));
    }

    #[test]
    fn test_commit_clears_and_promotes() {
        let mut entity = person();
        entity.set("name", "Alice").unwrap();
        let working = entity.audit().working.clone().unwrap();

        entity.commit();
        assert!(!entity.is_modified());
        assert!(entity.modified_properties().is_empty());
        assert_eq!(entity.audit().last_modified, working);
        assert!(entity.audit().working.is_none());
    }

    #[test]
    fn test_rollback_restores_first_touch_value() {
        let mut entity = person();
        entity.set("name", "Alice").unwrap();
        entity.commit();

        entity.set("name", "Bob").unwrap();
        entity.set("name", "Carol").unwrap();
        entity.rollback().unwrap();

        assert_eq!(entity.get("name"), Some(&Value::from("Alice")));
        assert!(!entity.is_modified());
        assert!(entity.was_rolled_back());
    }

    #[test]
    fn test_rollback_without_changes_is_illegal() {
        let mut entity = person();
        let err = entity.rollback().unwrap_err();
        assert!(matches!(err, EntityError::IllegalState(_)));
        assert!(!entity.was_rolled_back());
    }

    #[test]
    fn test_rollback_then_reject_then_reset() {
        let mut entity = person();
        entity.set("name", "Alice").unwrap();
        entity.rollback().unwrap();

        let err = entity.set("name", "Bob").unwrap_err();
        assert!(matches!(err, EntityError::ConstraintViolation { .. }));

        entity.reset();
        entity.set("name", "Bob").unwrap();
        assert_eq!(entity.get("name"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_permissive_rollback_policy() {
        let mut entity = Entity::builder("note")
            .property("text", vec![])
            .rollback_policy(RollbackPolicy::PermitMutations)
            .build()
            .unwrap();

        entity.set("text", "draft").unwrap();
        entity.rollback().unwrap();
        entity.set("text", "fresh").unwrap();
        assert_eq!(entity.get("text"), Some(&Value::from("fresh")));
    }

    #[test]
    fn test_key_assignment_is_tracked() {
        let mut entity = person();
        assert!(entity.is_new());

        let key = EntityKey::new();
        entity.set_key(key).unwrap();
        assert_eq!(entity.key(), Some(key));
        assert!(!entity.is_new());
        assert!(entity.modified_properties().contains(&properties::KEY.to_string()));

        entity.rollback().unwrap();
        assert!(entity.is_new());
    }

    #[test]
    fn test_keyed_entity_still_mutable() {
        let mut entity = person();
        entity.set_key(EntityKey::new()).unwrap();
        entity.commit();
        entity.set("name", "Alice").unwrap();
        assert!(entity.is_modified());
    }

    #[test]
    fn test_rollback_suppresses_notifications() {
        let fired = Rc::new(RefCell::new(0));
        let mut entity = person();
        let f = fired.clone();
        entity.add_property_listener(Box::new(move |_| {
            *f.borrow_mut() += 1;
        }));

        entity.set("name", "Alice").unwrap();
        assert_eq!(*fired.borrow(), 1);

        entity.rollback().unwrap();
        // Replay writes must not re-trigger listeners
        assert_eq!(*fired.borrow(), 1);
        assert!(entity.is_dispatch_enabled());
    }

    #[test]
    fn test_copy_is_detached() {
        let mut entity = person();
        entity.set_key(EntityKey::new()).unwrap();
        entity.set("name", "Alice").unwrap();
        entity.commit();
        entity.set("code", "AB").unwrap();

        let copy = entity.copy().unwrap();
        assert!(copy.is_new());
        assert!(!copy.is_modified());
        assert!(!copy.in_history());
        assert!(copy.is_mutable());
        assert_eq!(copy.get("name"), Some(&Value::from("Alice")));
        assert_eq!(copy.get("code"), Some(&Value::from("AB")));
    }

    #[test]
    fn test_to_json_snapshot() {
        let mut entity = person();
        entity.set("name", "Alice").unwrap();
        let json = entity.to_json().unwrap();
        assert_eq!(json["entity_type"], "person");
        assert_eq!(json["values"]["name"]["Text"], "Alice");
    }
}
