// ============================================================================
// RustEntity Library
// ============================================================================

//! Transactional, self-auditing mutable entity model.
//!
//! Every property mutation routes through a validation chain of veto
//! policies, is recorded for undo, stamps an audit trail, and fires ordered
//! listener notifications. Pending changes commit or roll back atomically
//! per entity, and entities can be collected into filterable histories that
//! maintain membership back-references.
//!
//! # Examples
//!
//! ```
//! use rustentity::{Bound, Entity, Value};
//!
//! # fn main() -> rustentity::Result<()> {
//! let mut person = Entity::builder("person")
//!     .property("name", vec![Bound::Required])
//!     .property("code", vec![Bound::max_length(5)])
//!     .build()?;
//!
//! person.set("name", "Alice")?;
//! assert!(person.is_modified());
//!
//! person.commit();
//! assert!(!person.is_modified());
//!
//! person.set("name", "Bob")?;
//! person.rollback()?;
//! assert_eq!(person.get("name"), Some(&Value::from("Alice")));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod entity;
pub mod events;
pub mod history;
pub mod prelude;
pub mod recorder;
pub mod validation;

// Re-export main types for convenience
pub use core::{Actor, EntityError, EntityKey, Result, Value, properties};
pub use entity::{
    AuditSource, AuditStamp, AuditTrail, Entity, EntityBuilder, EntityDescriptor,
    FixedAuditSource, RollbackPolicy, SystemAuditSource,
};
pub use events::{ListenerId, PropertyEvent, PropertyListener, StateEvent, StateListener};
pub use history::{EntityFilter, EntityRef, History, HistoryId, HistoryMode};
pub use recorder::{ChangeRecorder, PropertyChange, ProposedChange};
pub use validation::{Bound, EntityFlags, ValidationChain, VetoPolicy};
