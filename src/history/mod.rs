// ============================================================================
// History Module
// ============================================================================
//
// Filterable entity collections with membership back-references. Each
// entity knows its containing history and may belong to at most one at a
// time; bulk moves between histories snapshot first and transfer one
// entity at a time so ownership is never duplicated.
//
// ============================================================================

pub mod filter;
pub mod history;

pub use filter::{EntityFilter, IsModified, PropertyEquals};
pub use history::{EntityRef, History, HistoryId, HistoryMode};
