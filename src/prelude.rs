//! Recommended API entrypoints grouped by abstraction level.
//!
//! `dx` is the stable default for application code building and mutating
//! entities. `advanced` is an explicit escape hatch for callers wiring
//! their own policies, listeners, or audit sources.

pub mod dx {
    //! Stable high-level surface for domain-model application code.
    //!
    //! Intended usage in app code:
    //! - entity declaration through the builder,
    //! - property mutation with commit/rollback,
    //! - history membership and filtered queries.
    pub use crate::{
        Bound, Entity, EntityBuilder, EntityError, EntityKey, EntityRef, History, Result,
        RollbackPolicy, Value,
    };
}

pub mod advanced {
    //! Escape hatch for custom validation, notification, and audit wiring.
    //!
    //! App-level product code should normally stay on `prelude::dx`.
    pub use crate::entity::{AuditSource, AuditStamp, AuditTrail, FixedAuditSource, SystemAuditSource};
    pub use crate::events::{ListenerId, PropertyEvent, PropertyListener, StateEvent, StateListener};
    pub use crate::history::{EntityFilter, HistoryId, HistoryMode, IsModified, PropertyEquals};
    pub use crate::validation::{EntityFlags, ValidationChain, VetoPolicy};
}
