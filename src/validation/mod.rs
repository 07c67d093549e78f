// ============================================================================
// Validation Module
// ============================================================================
//
// Ordered veto policies inspect every proposed property change before it is
// applied. All policies must accept for the mutation to proceed; the first
// rejection aborts the call with a constraint violation.
//
// ============================================================================

pub mod bounds;
pub mod chain;
pub mod policy;

pub use bounds::Bound;
pub use chain::ValidationChain;
pub use policy::{BoundsGuard, EntityFlags, RequiredGuard, RollbackGuard, VetoPolicy};
