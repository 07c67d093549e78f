use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::Actor;

/// Supplies the current actor and time for audit stamps
///
/// The model never sources these itself: persistence layers, request
/// handlers, and tests inject their own notion of "who" and "when".
pub trait AuditSource {
    fn current_actor(&self) -> Actor;

    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock audit source attributing changes to a fixed actor
#[derive(Debug, Clone)]
pub struct SystemAuditSource {
    actor: Actor,
}

impl SystemAuditSource {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }
}

impl Default for SystemAuditSource {
    fn default() -> Self {
        Self::new(Actor::system())
    }
}

impl AuditSource for SystemAuditSource {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic audit source for tests
#[derive(Debug, Clone)]
pub struct FixedAuditSource {
    actor: Actor,
    at: DateTime<Utc>,
}

impl FixedAuditSource {
    pub fn new(actor: Actor, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }
}

impl AuditSource for FixedAuditSource {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// One attribution: who, when
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStamp {
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: Actor, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }
}

/// Audit metadata carried by every entity
///
/// `working` is the in-flight modifier/timestamp pair, refreshed on each
/// successful mutation and distinct from the committed pair until commit
/// promotes it. Rollback discards it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditTrail {
    pub created: AuditStamp,
    pub last_modified: AuditStamp,
    pub working: Option<AuditStamp>,
}

impl AuditTrail {
    pub fn new(stamp: AuditStamp) -> Self {
        Self {
            created: stamp.clone(),
            last_modified: stamp,
            working: None,
        }
    }

    /// Refresh the working pair after a successful mutation
    pub fn touch(&mut self, stamp: AuditStamp) {
        self.working = Some(stamp);
    }

    /// Promote the working pair to the committed last-modified pair
    pub fn promote(&mut self) {
        if let Some(working) = self.working.take() {
            self.last_modified = working;
        }
    }

    /// Drop the working pair without promoting it
    pub fn discard_working(&mut self) {
        self.working = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp(day: u32) -> AuditStamp {
        AuditStamp::new(
            Actor::user("u1", None),
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_promote_moves_working_pair() {
        let mut trail = AuditTrail::new(stamp(1));
        trail.touch(stamp(2));
        assert_eq!(trail.last_modified, stamp(1));

        trail.promote();
        assert_eq!(trail.last_modified, stamp(2));
        assert!(trail.working.is_none());
    }

    #[test]
    fn test_promote_without_working_is_noop() {
        let mut trail = AuditTrail::new(stamp(1));
        trail.promote();
        assert_eq!(trail.last_modified, stamp(1));
    }

    #[test]
    fn test_discard_keeps_committed_pair() {
        let mut trail = AuditTrail::new(stamp(1));
        trail.touch(stamp(2));
        trail.discard_working();
        assert_eq!(trail.last_modified, stamp(1));
        assert!(trail.working.is_none());
    }

    #[test]
    fn test_fixed_source_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let source = FixedAuditSource::new(Actor::agent("batch"), at);
        assert_eq!(source.now(), at);
        assert_eq!(source.current_actor(), Actor::agent("batch"));
    }
}
