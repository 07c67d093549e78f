use log::debug;

use crate::core::Result;
use crate::recorder::ProposedChange;
use crate::validation::{EntityFlags, VetoPolicy};

/// Ordered set of veto policies
///
/// Composing policies is logical AND with short-circuit: the first rejection
/// aborts the mutation and surfaces that policy's constraint violation.
/// Order is fixed when the chain is assembled at entity construction.
#[derive(Default)]
pub struct ValidationChain {
    policies: Vec<Box<dyn VetoPolicy>>,
}

impl ValidationChain {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    pub fn push(&mut self, policy: Box<dyn VetoPolicy>) {
        self.policies.push(policy);
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Run every policy against the proposed change, stopping at the first
    /// rejection
    pub fn check_all(&self, change: &ProposedChange<'_>, flags: &EntityFlags) -> Result<()> {
        for policy in &self.policies {
            if let Err(veto) = policy.check(change, flags) {
                debug!(
                    "mutation of '{}' vetoed by {}: {}",
                    change.property,
                    policy.name(),
                    veto
                );
                return Err(veto);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.policies.iter().map(|p| p.name()).collect();
        f.debug_struct("ValidationChain")
            .field("policies", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityError, Value};

    struct RejectAll;

    impl VetoPolicy for RejectAll {
        fn name(&self) -> &'static str {
            "reject_all"
        }

        fn check(&self, change: &ProposedChange<'_>, _flags: &EntityFlags) -> Result<()> {
            Err(EntityError::constraint(change.property, "always rejected"))
        }
    }

    struct AcceptAll;

    impl VetoPolicy for AcceptAll {
        fn name(&self) -> &'static str {
            "accept_all"
        }

        fn check(&self, _change: &ProposedChange<'_>, _flags: &EntityFlags) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_empty_chain_accepts() {
        let chain = ValidationChain::new();
        let old = Value::Null;
        let new = Value::Integer(1);
        let change = ProposedChange::new("n", &old, &new);
        assert!(chain.check_all(&change, &EntityFlags::default()).is_ok());
    }

    #[test]
    fn test_first_rejection_wins() {
        let mut chain = ValidationChain::new();
        chain.push(Box::new(AcceptAll));
        chain.push(Box::new(RejectAll));

        let old = Value::Null;
        let new = Value::Integer(1);
        let change = ProposedChange::new("n", &old, &new);
        let err = chain
            .check_all(&change, &EntityFlags::default())
            .unwrap_err();
        assert!(err.to_string().contains("always rejected"));
    }
}
