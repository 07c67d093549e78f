use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique entity identity.
///
/// An entity without a key is "new": it has never been persisted. Key
/// assignment routes through the mutation pipeline like any other property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(Uuid);

impl EntityKey {
    /// Generate a fresh random key
    pub fn new() -> Self {
        EntityKey(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityKey {
    fn from(id: Uuid) -> Self {
        EntityKey(id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who or what performed a mutation.
///
/// Audit stamps attribute every committed change to an actor. The library
/// never decides the current actor itself; an `AuditSource` supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor kind: `"system"`, `"user"`, or `"agent"`.
    pub kind: String,
    pub id: Option<String>,
    pub name: Option<String>,
}

impl Actor {
    /// Background jobs, internal processes.
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            id: None,
            name: None,
        }
    }

    /// Authenticated user actor.
    pub fn user(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            kind: "user".to_string(),
            id: Some(id.into()),
            name,
        }
    }

    /// Automated agent actor.
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            kind: "agent".to_string(),
            id: None,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, &self.name) {
            (Some(id), _) => write!(f, "{}:{}", self.kind, id),
            (None, Some(name)) => write!(f, "{}:{}", self.kind, name),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

/// Reserved property names.
pub mod properties {
    /// The entity key. Settable through the pipeline so key assignment is
    /// tracked and undoable like any other property.
    pub const KEY: &str = "id";
}
