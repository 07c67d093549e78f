use std::collections::BTreeMap;
use std::rc::Rc;

use crate::core::{Result, Value, properties};
use crate::entity::{AuditSource, Entity, SystemAuditSource};
use crate::validation::{Bound, BoundsGuard, RequiredGuard, RollbackGuard, ValidationChain, VetoPolicy};

/// What happens to mutations attempted after rollback, before reset()
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Post-rollback mutations are rejected until reset() is called
    #[default]
    RejectMutations,

    /// Post-rollback mutations are silently permitted
    PermitMutations,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PropertySpec {
    pub bounds: Vec<Bound>,
    pub default: Option<Value>,
}

/// Declarative metadata for one entity type
///
/// Carries the declared property set, per-property bounds, the rollback
/// policy, and the assembled validation chain. Shared (via `Rc`) by every
/// instance and copy of the type.
pub struct EntityDescriptor {
    type_name: String,
    properties: BTreeMap<String, PropertySpec>,
    rollback_policy: RollbackPolicy,
    chain: ValidationChain,
}

impl EntityDescriptor {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn declares(&self, property: &str) -> bool {
        self.properties.contains_key(property)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn bounds_for(&self, property: &str) -> &[Bound] {
        self.properties
            .get(property)
            .map(|spec| spec.bounds.as_slice())
            .unwrap_or(&[])
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        self.rollback_policy
    }

    pub(crate) fn chain(&self) -> &ValidationChain {
        &self.chain
    }

    pub(crate) fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .filter_map(|(name, spec)| spec.default.as_ref().map(|v| (name.as_str(), v)))
    }
}

impl std::fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("rollback_policy", &self.rollback_policy)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Assembles an entity's descriptor, validation chain, and notification bus
/// explicitly at build time
///
/// # Examples
///
/// ```
/// use rustentity::{Bound, Entity, RollbackPolicy, Value};
///
/// # fn main() -> rustentity::Result<()> {
/// let mut person = Entity::builder("person")
///     .property("name", vec![Bound::Required])
///     .property("code", vec![Bound::max_length(5)])
///     .property_with_default("active", vec![], Value::Boolean(true))
///     .rollback_policy(RollbackPolicy::RejectMutations)
///     .build()?;
///
/// person.set("name", "Alice")?;
/// assert!(person.is_modified());
/// person.commit();
/// assert!(!person.is_modified());
/// # Ok(())
/// # }
/// ```
pub struct EntityBuilder {
    type_name: String,
    properties: BTreeMap<String, PropertySpec>,
    rollback_policy: RollbackPolicy,
    custom_policies: Vec<Box<dyn VetoPolicy>>,
    audit_source: Option<Rc<dyn AuditSource>>,
}

impl EntityBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: BTreeMap::new(),
            rollback_policy: RollbackPolicy::default(),
            custom_policies: Vec::new(),
            audit_source: None,
        }
    }

    /// Declare a property with its bounds
    pub fn property(mut self, name: impl Into<String>, bounds: Vec<Bound>) -> Self {
        self.properties.insert(
            name.into(),
            PropertySpec {
                bounds,
                default: None,
            },
        );
        self
    }

    /// Declare a property seeded with a default value on instantiation
    pub fn property_with_default(
        mut self,
        name: impl Into<String>,
        bounds: Vec<Bound>,
        default: Value,
    ) -> Self {
        self.properties.insert(
            name.into(),
            PropertySpec {
                bounds,
                default: Some(default),
            },
        );
        self
    }

    pub fn rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.rollback_policy = policy;
        self
    }

    /// Append a custom veto policy, run after the standard guards
    pub fn policy(mut self, policy: Box<dyn VetoPolicy>) -> Self {
        self.custom_policies.push(policy);
        self
    }

    pub fn audit_source(mut self, source: Rc<dyn AuditSource>) -> Self {
        self.audit_source = Some(source);
        self
    }

    /// Assemble the validation chain and instantiate the entity
    ///
    /// Chain order is fixed here: rollback guard first (cheap
    /// short-circuit), then required-field guard, then bounds, then any
    /// custom policies in registration order.
    pub fn build(self) -> Result<Entity> {
        let required: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, spec)| spec.bounds.contains(&Bound::Required))
            .map(|(name, _)| name.clone())
            .collect();

        let bounds: BTreeMap<String, Vec<Bound>> = self
            .properties
            .iter()
            .filter(|(_, spec)| !spec.bounds.is_empty())
            .map(|(name, spec)| (name.clone(), spec.bounds.clone()))
            .collect();

        let mut chain = ValidationChain::new();
        chain.push(Box::new(RollbackGuard));
        chain.push(Box::new(RequiredGuard::new(required)));
        chain.push(Box::new(BoundsGuard::new(bounds)));
        for policy in self.custom_policies {
            chain.push(policy);
        }

        let descriptor = Rc::new(EntityDescriptor {
            type_name: self.type_name,
            properties: self.properties,
            rollback_policy: self.rollback_policy,
            chain,
        });

        let audit_source = self
            .audit_source
            .unwrap_or_else(|| Rc::new(SystemAuditSource::default()));

        Entity::instantiate(descriptor, audit_source)
    }
}
