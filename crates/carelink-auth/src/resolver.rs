//! The identity-resolver seam and role authorization.

use std::collections::HashMap;

use async_trait::async_trait;
use carelink_core::{Identity, Participant, Role};

use crate::errors::AuthError;

/// Turns a bearer credential into a verified identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Verify `credential`. Called once per connection.
    async fn resolve(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Fixed credential → identity table, for tests and local runs.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityResolver {
    identities: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    /// Empty table; every credential is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a credential.
    #[must_use]
    pub fn with(mut self, credential: impl Into<String>, identity: Identity) -> Self {
        let _ = self.identities.insert(credential.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Identity, AuthError> {
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        self.identities
            .get(credential)
            .copied()
            .ok_or_else(|| AuthError::InvalidToken("unknown credential".into()))
    }
}

/// Account-state checks applied after resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Refuse identities whose account is inactive.
    pub require_active: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            require_active: true,
        }
    }
}

/// Decide whether `identity` may connect as `role`.
///
/// Responders need the elevated flag. Seekers need nothing beyond an
/// (active) identity.
pub fn authorize(
    identity: &Identity,
    role: Role,
    policy: AccessPolicy,
) -> Result<Participant, AuthError> {
    if policy.require_active && !identity.is_active {
        return Err(AuthError::Inactive);
    }
    if role == Role::Responder && !identity.elevated {
        return Err(AuthError::Forbidden);
    }
    Ok(identity.as_participant(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use carelink_core::{ResponderId, SeekerId};

    #[tokio::test]
    async fn static_resolver_lookup() {
        let resolver = StaticIdentityResolver::new()
            .with("tok-s", Identity::seeker(1))
            .with("tok-r", Identity::responder(2));

        assert_eq!(resolver.resolve("tok-s").await.unwrap(), Identity::seeker(1));
        assert_eq!(resolver.resolve("tok-r").await.unwrap().id, 2);
        assert_matches!(resolver.resolve("nope").await, Err(AuthError::InvalidToken(_)));
        assert_matches!(resolver.resolve("").await, Err(AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn resolver_is_object_safe() {
        let resolver: Box<dyn IdentityResolver> =
            Box::new(StaticIdentityResolver::new().with("t", Identity::seeker(5)));
        assert_eq!(resolver.resolve("t").await.unwrap().id, 5);
    }

    #[test]
    fn seeker_needs_no_privilege() {
        let p = authorize(&Identity::seeker(1), Role::Seeker, AccessPolicy::default()).unwrap();
        assert_eq!(p, Participant::Seeker(SeekerId::new(1)));
    }

    #[test]
    fn elevated_identity_may_use_either_endpoint() {
        let id = Identity::responder(2);
        assert_eq!(
            authorize(&id, Role::Responder, AccessPolicy::default()).unwrap(),
            Participant::Responder(ResponderId::new(2))
        );
        assert_eq!(
            authorize(&id, Role::Seeker, AccessPolicy::default()).unwrap(),
            Participant::Seeker(SeekerId::new(2))
        );
    }

    #[test]
    fn responder_requires_elevation() {
        assert_matches!(
            authorize(&Identity::seeker(1), Role::Responder, AccessPolicy::default()),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn inactive_rejected_unless_policy_allows() {
        let id = Identity {
            id: 3,
            is_active: false,
            elevated: true,
        };
        assert_matches!(
            authorize(&id, Role::Seeker, AccessPolicy::default()),
            Err(AuthError::Inactive)
        );
        let lax = AccessPolicy {
            require_active: false,
        };
        assert!(authorize(&id, Role::Responder, lax).is_ok());
    }
}
