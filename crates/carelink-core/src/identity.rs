//! Identities and roles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ResponderId, SeekerId};

/// Which side of the service a connection speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Someone looking for help (patient).
    #[serde(rename = "patient")]
    Seeker,
    /// Someone offering help (psychologist). Requires the elevated flag.
    #[serde(rename = "psychologist")]
    Responder,
}

impl Role {
    /// Value of the `is_psychologist` flag on frames sent by this role.
    #[must_use]
    pub const fn is_psychologist(self) -> bool {
        matches!(self, Self::Responder)
    }

    /// Wire name, also used as the endpoint path segment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seeker => "patient",
            Self::Responder => "psychologist",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified identity as returned by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account id.
    pub id: i64,
    /// Whether the account is active.
    pub is_active: bool,
    /// Elevated-privilege flag; required to act as a responder.
    pub elevated: bool,
}

impl Identity {
    /// Active identity without elevated privileges.
    #[must_use]
    pub const fn seeker(id: i64) -> Self {
        Self {
            id,
            is_active: true,
            elevated: false,
        }
    }

    /// Active identity with elevated privileges.
    #[must_use]
    pub const fn responder(id: i64) -> Self {
        Self {
            id,
            is_active: true,
            elevated: true,
        }
    }

    /// Bind this identity to a role. Does not check privileges.
    #[must_use]
    pub const fn as_participant(&self, role: Role) -> Participant {
        match role {
            Role::Seeker => Participant::Seeker(SeekerId::new(self.id)),
            Role::Responder => Participant::Responder(ResponderId::new(self.id)),
        }
    }
}

/// An authorized connection's identity within the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Participant {
    /// Registered as a seeker.
    Seeker(SeekerId),
    /// Registered as a responder.
    Responder(ResponderId),
}

impl Participant {
    /// The participant's role.
    #[must_use]
    pub const fn role(self) -> Role {
        match self {
            Self::Seeker(_) => Role::Seeker,
            Self::Responder(_) => Role::Responder,
        }
    }

    /// The raw account id.
    #[must_use]
    pub const fn raw_id(self) -> i64 {
        match self {
            Self::Seeker(id) => id.get(),
            Self::Responder(id) => id.get(),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role(), self.raw_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::Seeker.as_str(), "patient");
        assert_eq!(Role::Responder.as_str(), "psychologist");
        assert_eq!(serde_json::to_string(&Role::Responder).unwrap(), "\"psychologist\"");
    }

    #[test]
    fn only_responders_are_psychologists() {
        assert!(!Role::Seeker.is_psychologist());
        assert!(Role::Responder.is_psychologist());
    }

    #[test]
    fn identity_binds_to_role() {
        let id = Identity::responder(9);
        assert_eq!(
            id.as_participant(Role::Responder),
            Participant::Responder(ResponderId::new(9))
        );
        assert_eq!(
            id.as_participant(Role::Seeker),
            Participant::Seeker(SeekerId::new(9))
        );
    }

    #[test]
    fn participant_accessors() {
        let p = Participant::Seeker(SeekerId::new(3));
        assert_eq!(p.role(), Role::Seeker);
        assert_eq!(p.raw_id(), 3);
        assert_eq!(p.to_string(), "patient:3");
    }
}
