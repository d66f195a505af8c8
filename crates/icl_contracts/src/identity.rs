#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, Validate};

/// Authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub username: String,
}

impl Identity {
    pub fn v1(
        name: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, ContractViolation> {
        let identity = Self {
            name: name.into(),
            username: username.into(),
        };
        identity.validate()?;
        Ok(identity)
    }
}

impl Validate for Identity {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.username.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "identity.username",
                reason: "must not be empty",
            });
        }
        if self.username.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "identity.username",
                reason: "must be <= 128 chars",
            });
        }
        if self.name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "identity.name",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Session guard outcome. `Rejected` is a failed explicit login attempt (shown as
/// an inline error); `Unauthenticated` means no valid attempt yet (shown as a
/// login prompt). Only `Authenticated` callers may reach the submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated(Identity),
    Rejected,
    Unauthenticated,
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Rejected | Self::Unauthenticated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_username_is_rejected() {
        assert!(Identity::v1("Dr. Example", "").is_err());
        assert!(Identity::v1("", "drx").is_err());
        assert!(Identity::v1("Dr. Example", "drx").is_ok());
    }

    #[test]
    fn only_authenticated_state_exposes_identity() {
        let identity = Identity::v1("Dr. Example", "drx").unwrap();
        assert!(AuthState::Authenticated(identity).identity().is_some());
        assert!(AuthState::Rejected.identity().is_none());
        assert!(AuthState::Unauthenticated.identity().is_none());
    }
}
