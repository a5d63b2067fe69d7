//! Role authority: capability membership gated by a single admin.
//!
//! One [`RoleAuthority`] serves every deployment flavour; the checks it
//! enforces and whether it emits role notifications are selected by an
//! [`AuthorityPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CertchainError, Result};
use crate::events::Event;
use crate::types::Principal;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Certifier,
    Producer,
    Verifier,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Certifier, Role::Producer, Role::Verifier];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certifier => write!(f, "certifier"),
            Self::Producer => write!(f, "producer"),
            Self::Verifier => write!(f, "verifier"),
        }
    }
}

impl FromStr for Role {
    type Err = CertchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "certifier" => Ok(Self::Certifier),
            "producer" => Ok(Self::Producer),
            "verifier" => Ok(Self::Verifier),
            other => Err(CertchainError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Which checks and notifications the authority applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityPolicy {
    /// Reject re-granting a held role and revoking an absent one.  When off,
    /// both are silent no-ops.
    pub strict: bool,
    /// Emit `RoleGranted` / `RoleRevoked` / `AdminTransferred`.
    pub notify: bool,
}

impl AuthorityPolicy {
    pub const fn full() -> Self {
        Self {
            strict: true,
            notify: true,
        }
    }

    pub const fn simplified() -> Self {
        Self {
            strict: true,
            notify: false,
        }
    }

    pub const fn minimal() -> Self {
        Self {
            strict: false,
            notify: false,
        }
    }
}

impl Default for AuthorityPolicy {
    fn default() -> Self {
        Self::full()
    }
}

impl FromStr for AuthorityPolicy {
    type Err = CertchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::full()),
            "simplified" => Ok(Self::simplified()),
            "minimal" => Ok(Self::minimal()),
            other => Err(CertchainError::Validation(format!(
                "unknown authority profile '{other}' (expected full, simplified or minimal)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAuthority {
    admin: Principal,
    policy: AuthorityPolicy,
    members: BTreeMap<Role, BTreeSet<Principal>>,
}

impl RoleAuthority {
    pub fn new(admin: Principal, policy: AuthorityPolicy) -> Result<Self> {
        admin.ensure_not_null("admin")?;
        Ok(Self {
            admin,
            policy,
            members: BTreeMap::new(),
        })
    }

    pub fn admin(&self) -> &Principal {
        &self.admin
    }

    pub fn policy(&self) -> AuthorityPolicy {
        self.policy
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        &self.admin == principal
    }

    pub fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(principal))
    }

    pub fn roles_of(&self, principal: &Principal) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|r| self.has_role(principal, *r))
            .collect()
    }

    pub fn members(&self, role: Role) -> Vec<Principal> {
        self.members
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Fail with an authorization error unless `principal` holds `role`.
    pub fn require_role(&self, principal: &Principal, role: Role) -> Result<()> {
        if !self.has_role(principal, role) {
            return Err(CertchainError::Authorization(format!(
                "{principal} does not hold the {role} role"
            )));
        }
        Ok(())
    }

    fn require_admin(&self, caller: &Principal, action: &str) -> Result<()> {
        if !self.is_admin(caller) {
            return Err(CertchainError::Authorization(format!(
                "only the admin may {action}"
            )));
        }
        Ok(())
    }

    pub fn grant(
        &mut self,
        caller: &Principal,
        principal: &Principal,
        role: Role,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        self.require_admin(caller, "grant roles")?;
        principal.ensure_not_null("grantee")?;

        if self.has_role(principal, role) {
            if self.policy.strict {
                return Err(CertchainError::StateConflict(format!(
                    "{principal} already holds the {role} role"
                )));
            }
            debug!(%principal, %role, "role already held; grant ignored");
            return Ok(());
        }

        self.members.entry(role).or_default().insert(principal.clone());
        info!(%principal, %role, "role granted");
        if self.policy.notify {
            events.push(Event::RoleGranted {
                principal: principal.clone(),
                role,
                granted_by: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: &Principal,
        principal: &Principal,
        role: Role,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        self.require_admin(caller, "revoke roles")?;

        if !self.has_role(principal, role) {
            if self.policy.strict {
                return Err(CertchainError::Validation(format!(
                    "{principal} does not hold the {role} role"
                )));
            }
            debug!(%principal, %role, "role not held; revoke ignored");
            return Ok(());
        }

        if let Some(set) = self.members.get_mut(&role) {
            set.remove(principal);
            if set.is_empty() {
                self.members.remove(&role);
            }
        }
        info!(%principal, %role, "role revoked");
        if self.policy.notify {
            events.push(Event::RoleRevoked {
                principal: principal.clone(),
                role,
                revoked_by: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn transfer_admin(
        &mut self,
        caller: &Principal,
        new_admin: &Principal,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        self.require_admin(caller, "transfer administration")?;
        new_admin.ensure_not_null("new admin")?;

        let previous = std::mem::replace(&mut self.admin, new_admin.clone());
        info!(%previous, new_admin = %self.admin, "admin transferred");
        if self.policy.notify {
            events.push(Event::AdminTransferred {
                previous,
                new_admin: new_admin.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(policy: AuthorityPolicy) -> RoleAuthority {
        RoleAuthority::new(Principal::new("admin"), policy).unwrap()
    }

    #[test]
    fn admin_grants_and_revokes() {
        let mut auth = authority(AuthorityPolicy::full());
        let admin = Principal::new("admin");
        let alice = Principal::new("alice");
        let mut events = Vec::new();

        auth.grant(&admin, &alice, Role::Producer, &mut events).unwrap();
        assert!(auth.has_role(&alice, Role::Producer));
        assert!(!auth.has_role(&alice, Role::Verifier));
        assert_eq!(auth.roles_of(&alice), vec![Role::Producer]);

        auth.revoke(&admin, &alice, Role::Producer, &mut events).unwrap();
        assert!(!auth.has_role(&alice, Role::Producer));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].name(), "RoleRevoked");
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut auth = authority(AuthorityPolicy::full());
        let mallory = Principal::new("mallory");
        let mut events = Vec::new();
        let err = auth.grant(&mallory, &mallory, Role::Certifier, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::Authorization(_)));
        assert!(events.is_empty());
        assert!(!auth.has_role(&mallory, Role::Certifier));
    }

    #[test]
    fn strict_policy_rejects_double_grant_and_absent_revoke() {
        let mut auth = authority(AuthorityPolicy::full());
        let admin = Principal::new("admin");
        let bob = Principal::new("bob");
        let mut events = Vec::new();

        auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap();
        let err = auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));

        let err = auth.revoke(&admin, &bob, Role::Producer, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::Validation(_)));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn simplified_policy_is_strict_but_silent() {
        let mut auth = authority(AuthorityPolicy::simplified());
        let admin = Principal::new("admin");
        let bob = Principal::new("bob");
        let mut events = Vec::new();

        auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap();
        assert!(auth.has_role(&bob, Role::Verifier));
        let err = auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));

        let err = auth.revoke(&admin, &bob, Role::Producer, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::Validation(_)));

        auth.revoke(&admin, &bob, Role::Verifier, &mut events).unwrap();
        assert!(!auth.has_role(&bob, Role::Verifier));
        auth.transfer_admin(&admin, &bob, &mut events).unwrap();
        assert!(auth.is_admin(&bob));
        assert!(events.is_empty());
    }

    #[test]
    fn minimal_policy_is_idempotent_and_silent() {
        let mut auth = authority(AuthorityPolicy::minimal());
        let admin = Principal::new("admin");
        let bob = Principal::new("bob");
        let mut events = Vec::new();

        auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap();
        auth.grant(&admin, &bob, Role::Verifier, &mut events).unwrap();
        auth.revoke(&admin, &bob, Role::Producer, &mut events).unwrap();
        assert!(auth.has_role(&bob, Role::Verifier));
        assert!(events.is_empty());
    }

    #[test]
    fn null_grantee_rejected() {
        let mut auth = authority(AuthorityPolicy::full());
        let admin = Principal::new("admin");
        let err = auth
            .grant(&admin, &Principal::new(""), Role::Producer, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CertchainError::Validation(_)));
    }

    #[test]
    fn admin_transfer_moves_authority() {
        let mut auth = authority(AuthorityPolicy::full());
        let old = Principal::new("admin");
        let new = Principal::new("coop-board");
        let mut events = Vec::new();

        auth.transfer_admin(&old, &new, &mut events).unwrap();
        assert!(auth.is_admin(&new));
        let err = auth.grant(&old, &old, Role::Producer, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::Authorization(_)));
    }

    #[test]
    fn parse_roles_and_profiles() {
        assert_eq!("Verifier".parse::<Role>().unwrap(), Role::Verifier);
        assert!("auditor".parse::<Role>().is_err());
        assert_eq!(
            "minimal".parse::<AuthorityPolicy>().unwrap(),
            AuthorityPolicy::minimal()
        );
    }
}
