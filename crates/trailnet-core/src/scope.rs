//! Structure-scoping capability.
//!
//! Every registry, composer, and attachment operation receives a [`Scope`]
//! describing the caller. Access to an entity owned by another structure is
//! refused with [`TopologyError::ScopeViolation`] unless the scope is
//! elevated.

use serde::{Deserialize, Serialize};

use crate::error::{NetworkResult, TopologyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub structure: String,
    /// Elevated callers may cross structure boundaries.
    pub elevated: bool,
}

impl Scope {
    pub fn new(structure: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            elevated: false,
        }
    }

    pub fn elevated(structure: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            elevated: true,
        }
    }

    pub fn allows(&self, owner: &str) -> bool {
        self.elevated || self.structure == owner
    }

    pub fn check(&self, owner: &str) -> NetworkResult<()> {
        if self.allows(owner) {
            Ok(())
        } else {
            tracing::warn!(caller = %self.structure, owner, "cross-structure access refused");
            Err(TopologyError::ScopeViolation {
                caller: self.structure.clone(),
                owner: owner.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_structure_allowed() {
        assert!(Scope::new("north").check("north").is_ok());
    }

    #[test]
    fn test_other_structure_refused() {
        let err = Scope::new("north").check("south").unwrap_err();
        assert_eq!(err.code(), "scope_violation");
    }

    #[test]
    fn test_elevated_crosses_structures() {
        assert!(Scope::elevated("north").check("south").is_ok());
    }
}
