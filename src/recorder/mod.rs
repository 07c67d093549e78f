// ============================================================================
// Change Recording Module
// ============================================================================
//
// Tracks, per entity instance, which named properties carry uncommitted
// changes and their pre-change values.
//
// Design Patterns Used:
// - Command Pattern: recorded originals replayed on rollback
// - First-touch-wins: the first mutation of a property since the last
//   commit/rollback fixes the value rollback restores
//
// ============================================================================

pub mod change;
pub mod recorder;

pub use change::{PropertyChange, ProposedChange};
pub use recorder::ChangeRecorder;
