use crate::core::Value;
use crate::entity::Entity;

/// Predicate over entities, used by every filterable history operation
///
/// Passing no filters means accept-all. An entity matches a filter set only
/// when every filter accepts it.
pub trait EntityFilter {
    fn accept(&self, entity: &Entity) -> bool;
}

impl<F> EntityFilter for F
where
    F: Fn(&Entity) -> bool,
{
    fn accept(&self, entity: &Entity) -> bool {
        self(entity)
    }
}

/// Matches entities whose property equals the given value
pub struct PropertyEquals {
    property: String,
    value: Value,
}

impl PropertyEquals {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl EntityFilter for PropertyEquals {
    fn accept(&self, entity: &Entity) -> bool {
        entity.get(&self.property) == Some(&self.value)
    }
}

/// Matches entities with uncommitted changes
pub struct IsModified;

impl EntityFilter for IsModified {
    fn accept(&self, entity: &Entity) -> bool {
        entity.is_modified()
    }
}

pub(crate) fn accepts(filters: &[&dyn EntityFilter], entity: &Entity) -> bool {
    filters.iter().all(|filter| filter.accept(entity))
}
