use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::core::{EntityError, EntityKey, Result};
use crate::entity::Entity;
use crate::history::filter::{self, EntityFilter};

static NEXT_HISTORY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique history identity, used for entity back-references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryId(u64);

impl HistoryId {
    fn next() -> Self {
        Self(NEXT_HISTORY_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "history_{}", self.0)
    }
}

/// Shared handle to an entity held by a history
///
/// Single-threaded shared ownership. Callers sharing a history across
/// threads must synchronize externally.
pub type EntityRef = Rc<RefCell<Entity>>;

/// Ordering semantics of a history, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Insertion order preserved; identity duplicates allowed
    Ordered,

    /// At most one entry per key; reads sorted by key, unkeyed entries first
    Unique,
}

/// Collection of entities with membership back-references
///
/// Every entity in a history carries the history's id; an entity belongs to
/// at most one history at a time. All query and mutation operations accept
/// zero or more filters (zero filters means accept-all).
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rustentity::{Bound, Entity, History};
///
/// # fn main() -> rustentity::Result<()> {
/// let mut archive = History::ordered("archive");
/// let person = Rc::new(RefCell::new(
///     Entity::builder("person")
///         .property("name", vec![Bound::Required])
///         .build()?,
/// ));
///
/// assert!(archive.add(&person, &[])?);
/// assert!(person.borrow().in_history());
/// assert_eq!(archive.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct History {
    id: HistoryId,
    name: String,
    mode: HistoryMode,
    entries: Vec<EntityRef>,
    mutable: bool,
}

impl History {
    /// Insertion-ordered history
    pub fn ordered(name: impl Into<String>) -> Self {
        Self::new(name, HistoryMode::Ordered)
    }

    /// Key-unique history; reads come back sorted by key, unkeyed first
    pub fn unique(name: impl Into<String>) -> Self {
        Self::new(name, HistoryMode::Unique)
    }

    fn new(name: impl Into<String>, mode: HistoryMode) -> Self {
        Self {
            id: HistoryId::next(),
            name: name.into(),
            mode,
            entries: Vec::new(),
            mutable: true,
        }
    }

    pub fn id(&self) -> HistoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable = mutable;
    }

    // ------------------------------------------------------------------
    // Membership mutation
    // ------------------------------------------------------------------

    /// Add an entity if it passes the filters
    ///
    /// Returns `Ok(false)` without touching anything when a filter rejects
    /// the entity, when it is already a member here, or when unique mode
    /// already holds its key. On success the entity's back-reference is set.
    ///
    /// # Errors
    /// `IllegalState` if the entity belongs to a different history, or this
    /// history is immutable. Neither side changes state.
    pub fn add(&mut self, entity: &EntityRef, filters: &[&dyn EntityFilter]) -> Result<bool> {
        self.ensure_mutable("add")?;

        {
            let candidate = entity.borrow();
            match candidate.history_id() {
                Some(id) if id == self.id => return Ok(false),
                Some(id) => {
                    return Err(EntityError::IllegalState(format!(
                        "entity '{}' already belongs to {}, cannot join {}",
                        candidate.descriptor().type_name(),
                        id,
                        self.id
                    )));
                }
                None => {}
            }

            if !filter::accepts(filters, &candidate) {
                return Ok(false);
            }

            if self.mode == HistoryMode::Unique
                && let Some(key) = candidate.key()
                && self.get_by_id(&key).is_some()
            {
                return Ok(false);
            }
        }

        entity.borrow_mut().set_history(Some(self.id));
        self.entries.push(entity.clone());
        debug!(
            "history '{}' ({}): entity added, size {}",
            self.name,
            self.id,
            self.entries.len()
        );
        Ok(true)
    }

    /// Add every entity that passes the filters; returns how many joined
    pub fn add_all(
        &mut self,
        entities: &[EntityRef],
        filters: &[&dyn EntityFilter],
    ) -> Result<usize> {
        let mut added = 0;
        for entity in entities {
            if self.add(entity, filters)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Move matching entities out of another history into this one
    ///
    /// Snapshots the source membership first, then per matching entity:
    /// remove from the source, add here. At no point does an entity belong
    /// to both, and the live source collection is never iterated while
    /// being mutated. Non-matching entities stay in the source untouched.
    /// If this history declines an entity (unique-mode key clash) it is
    /// handed back to the source.
    pub fn adopt_all(
        &mut self,
        source: &mut History,
        filters: &[&dyn EntityFilter],
    ) -> Result<usize> {
        self.ensure_mutable("adopt_all")?;
        source.ensure_mutable("adopt_all")?;

        let matching = source.snapshot(filters);
        let mut moved = 0;
        for entity in matching {
            if !source.remove(&entity)? {
                continue;
            }
            match self.add(&entity, &[]) {
                Ok(true) => moved += 1,
                Ok(false) => {
                    source.add(&entity, &[])?;
                }
                Err(e) => {
                    source.add(&entity, &[])?;
                    return Err(e);
                }
            }
        }
        debug!(
            "history '{}' ({}): adopted {} entities from '{}'",
            self.name, self.id, moved, source.name
        );
        Ok(moved)
    }

    /// Remove one entity by identity, clearing its back-reference
    pub fn remove(&mut self, entity: &EntityRef) -> Result<bool> {
        self.ensure_mutable("remove")?;

        let Some(pos) = self.entries.iter().position(|e| Rc::ptr_eq(e, entity)) else {
            return Ok(false);
        };
        let removed = self.entries.remove(pos);
        removed.borrow_mut().set_history(None);
        debug!(
            "history '{}' ({}): entity removed, size {}",
            self.name,
            self.id,
            self.entries.len()
        );
        Ok(true)
    }

    /// Remove every matching entity; returns how many left
    pub fn remove_matching(&mut self, filters: &[&dyn EntityFilter]) -> Result<usize> {
        self.ensure_mutable("remove_matching")?;

        let entries = std::mem::take(&mut self.entries);
        let (removed, kept): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| filter::accepts(filters, &e.borrow()));
        self.entries = kept;

        for entity in &removed {
            entity.borrow_mut().set_history(None);
        }
        debug!(
            "history '{}' ({}): removed {} entities, size {}",
            self.name,
            self.id,
            removed.len(),
            self.entries.len()
        );
        Ok(removed.len())
    }

    /// Empty the history, clearing every member's back-reference
    pub fn clear(&mut self) -> Result<usize> {
        self.ensure_mutable("clear")?;

        let entries = std::mem::take(&mut self.entries);
        for entity in &entries {
            entity.borrow_mut().set_history(None);
        }
        debug!(
            "history '{}' ({}): cleared {} entities",
            self.name,
            self.id,
            entries.len()
        );
        Ok(entries.len())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Membership test by identity, not by value equality
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entries.iter().any(|e| Rc::ptr_eq(e, entity))
    }

    pub fn contains_matching(&self, filters: &[&dyn EntityFilter]) -> bool {
        self.entries
            .iter()
            .any(|e| filter::accepts(filters, &e.borrow()))
    }

    /// First matching entity, in this history's read order
    pub fn get(&self, filters: &[&dyn EntityFilter]) -> Option<EntityRef> {
        self.snapshot(filters).into_iter().next()
    }

    pub fn get_all(&self, filters: &[&dyn EntityFilter]) -> Vec<EntityRef> {
        self.snapshot(filters)
    }

    pub fn get_by_id(&self, key: &EntityKey) -> Option<EntityRef> {
        self.entries
            .iter()
            .find(|e| e.borrow().key() == Some(*key))
            .cloned()
    }

    pub fn size(&self, filters: &[&dyn EntityFilter]) -> usize {
        self.entries
            .iter()
            .filter(|e| filter::accepts(filters, &e.borrow()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot iterator; safe to mutate the history while consuming it
    pub fn iter(&self, filters: &[&dyn EntityFilter]) -> impl Iterator<Item = EntityRef> {
        self.snapshot(filters).into_iter()
    }

    /// Matching members in read order: insertion order for `Ordered`,
    /// key-sorted with unkeyed entries first for `Unique`
    fn snapshot(&self, filters: &[&dyn EntityFilter]) -> Vec<EntityRef> {
        let mut matching: Vec<EntityRef> = self
            .entries
            .iter()
            .filter(|e| filter::accepts(filters, &e.borrow()))
            .cloned()
            .collect();
        if self.mode == HistoryMode::Unique {
            matching.sort_by_key(|e| e.borrow().key());
        }
        matching
    }

    fn ensure_mutable(&self, operation: &str) -> Result<()> {
        if self.mutable {
            return Ok(());
        }
        Err(EntityError::IllegalState(format!(
            "{} on immutable history '{}'",
            operation, self.name
        )))
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("len", &self.entries.len())
            .field("mutable", &self.mutable)
            .finish()
    }
}
