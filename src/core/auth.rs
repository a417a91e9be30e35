//! Identity binding for dispatch connections
//!
//! A client claims an actor id with `user:connect` / `ambulance:connect`.
//! Before the claim is registered, the configured [`IdentityVerifier`] sees
//! the credential the connection presented at upgrade time (`?token=...`)
//! and may refuse it. Issuing credentials is the job of the external auth
//! service; this module only checks them.

use crate::config::TokenGrant;
use crate::core::error::EventError;
use crate::core::model::{ActorRole, Identity};
use std::collections::HashMap;

/// Trait for identity verifiers
///
/// Runs inside the dispatch loop, so implementations must not block.
pub trait IdentityVerifier: Send + Sync {
    /// Accept or refuse `claim` for a connection that presented `credential`
    fn verify(&self, credential: Option<&str>, claim: &Identity) -> Result<(), EventError>;

    /// Whether events naming an actor must come from that actor's connection
    fn binds_senders(&self) -> bool {
        true
    }
}

/// Accepts every claim (development default)
///
/// Any client can claim any actor id under this verifier.
pub struct TrustingVerifier;

impl IdentityVerifier for TrustingVerifier {
    fn verify(&self, _credential: Option<&str>, _claim: &Identity) -> Result<(), EventError> {
        Ok(())
    }

    fn binds_senders(&self) -> bool {
        false
    }
}

/// Binds opaque tokens to exactly one (role, actor id)
pub struct StaticTokenVerifier {
    grants: HashMap<String, (ActorRole, String)>,
}

impl StaticTokenVerifier {
    pub fn new(grants: &[TokenGrant]) -> Self {
        let grants = grants
            .iter()
            .map(|g| (g.token.clone(), (g.role, g.actor_id.clone())))
            .collect();
        Self { grants }
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, credential: Option<&str>, claim: &Identity) -> Result<(), EventError> {
        let reject = |reason: &str| EventError::IdentityRejected {
            role: claim.role,
            actor_id: claim.actor_id.clone(),
            reason: reason.to_string(),
        };

        let token = credential.ok_or_else(|| reject("no credential presented"))?;
        match self.grants.get(token) {
            Some((role, actor_id)) if *role == claim.role && *actor_id == claim.actor_id => Ok(()),
            Some(_) => Err(reject("credential issued to a different actor")),
            None => Err(reject("unknown credential")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> StaticTokenVerifier {
        StaticTokenVerifier::new(&[
            TokenGrant {
                token: "tok-u1".to_string(),
                role: ActorRole::User,
                actor_id: "u1".to_string(),
            },
            TokenGrant {
                token: "tok-amb1".to_string(),
                role: ActorRole::Ambulance,
                actor_id: "amb1".to_string(),
            },
        ])
    }

    #[test]
    fn test_trusting_verifier_accepts_anything() {
        let claim = Identity::new(ActorRole::Driver, "d1");
        assert!(TrustingVerifier.verify(None, &claim).is_ok());
        assert!(!TrustingVerifier.binds_senders());
    }

    #[test]
    fn test_static_verifier_matching_token() {
        let v = verifier();
        assert!(v.verify(Some("tok-u1"), &Identity::new(ActorRole::User, "u1")).is_ok());
        assert!(
            v.verify(Some("tok-amb1"), &Identity::ambulance("amb1", "d1"))
                .is_ok()
        );
        assert!(v.binds_senders());
    }

    #[test]
    fn test_static_verifier_rejects_mismatch() {
        let v = verifier();

        let wrong_actor = v.verify(Some("tok-u1"), &Identity::new(ActorRole::User, "u2"));
        assert!(matches!(
            wrong_actor,
            Err(EventError::IdentityRejected { .. })
        ));

        let wrong_role = v.verify(Some("tok-u1"), &Identity::new(ActorRole::Driver, "u1"));
        assert!(wrong_role.is_err());

        assert!(v.verify(None, &Identity::new(ActorRole::User, "u1")).is_err());
        assert!(
            v.verify(Some("forged"), &Identity::new(ActorRole::User, "u1"))
                .is_err()
        );
    }
}
