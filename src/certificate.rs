//! Certificate asset class: issuance, revocation, and the validity predicate.
//!
//! ## Lifecycle
//! 1. A **Certifier** issues a certificate to a certified entity: `issue()`.
//! 2. The issuer (or the admin) may revoke it once: `revoke()`.
//! 3. Anyone may ask whether it is currently valid: `valid()`.
//!
//! Expiry is not a stored transition.  A certificate past its expiry stays
//! `Active` but `valid()` reports `false`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CertchainError, OptionExt as _, Result};
use crate::events::Event;
use crate::roles::{Role, RoleAuthority};
use crate::types::{CallContext, CertificateId, Principal, Timestamp};
use crate::util;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_by: Principal,
    pub revoked_at: Timestamp,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub external_id: String,
    pub cert_type: String,
    pub issuer: Principal,
    /// Also the owner of the certificate.
    pub certified_entity: Principal,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub status: CertificateStatus,
    pub metadata_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<Revocation>,
}

impl Certificate {
    pub fn owner(&self) -> &Principal {
        &self.certified_entity
    }

    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.status == CertificateStatus::Active && now <= self.expires_at
    }
}

/// Arguments of [`CertificateLedger::issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCertificate {
    pub external_id: String,
    pub cert_type: String,
    pub certified_entity: Principal,
    /// Seconds from issuance until expiry.
    pub validity_secs: u64,
    #[serde(default)]
    pub metadata_ref: String,
}

// ---------------------------------------------------------------------------
// Validator capability
// ---------------------------------------------------------------------------

/// The one question the batch ledger asks about certificates.
///
/// Implemented by [`CertificateLedger`]; tests substitute fakes.
pub trait CertificateValidator {
    /// `Ok(true)` iff the certificate exists, is active and unexpired at `now`.
    /// Unknown ids are a `NotFound` error.
    fn valid(&self, id: CertificateId, now: Timestamp) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateLedger {
    next_id: CertificateId,
    certificates: BTreeMap<CertificateId, Certificate>,
}

impl Default for CertificateLedger {
    fn default() -> Self {
        Self {
            next_id: CertificateId::FIRST,
            certificates: BTreeMap::new(),
        }
    }
}

impl CertificateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// The id the next successful `issue` will assign.
    pub fn next_id(&self) -> CertificateId {
        self.next_id
    }

    pub fn issue(
        &mut self,
        ctx: &CallContext,
        roles: &RoleAuthority,
        input: IssueCertificate,
        events: &mut Vec<Event>,
    ) -> Result<CertificateId> {
        roles.require_role(&ctx.caller, Role::Certifier)?;
        util::require_non_empty(&input.external_id, "certificate external id")?;
        input.certified_entity.ensure_not_null("certified entity")?;
        if input.validity_secs == 0 {
            return Err(CertchainError::Validation(
                "validity duration must be greater than zero".into(),
            ));
        }
        let expires_at = ctx.now.checked_add(input.validity_secs).ok_or_else(|| {
            CertchainError::Validation("validity duration overflows the timestamp range".into())
        })?;

        let id = self.next_id;
        let cert = Certificate {
            id,
            external_id: input.external_id,
            cert_type: input.cert_type,
            issuer: ctx.caller.clone(),
            certified_entity: input.certified_entity,
            issued_at: ctx.now,
            expires_at,
            status: CertificateStatus::Active,
            metadata_ref: input.metadata_ref,
            revocation: None,
        };

        info!(
            certificate = id.0,
            cert_type = %cert.cert_type,
            entity = %cert.certified_entity,
            expires_at,
            "certificate issued"
        );
        events.push(Event::CertificateIssued {
            certificate_id: id,
            external_id: cert.external_id.clone(),
            cert_type: cert.cert_type.clone(),
            issuer: cert.issuer.clone(),
            certified_entity: cert.certified_entity.clone(),
            expires_at,
        });
        self.certificates.insert(id, cert);
        self.next_id = id.next();
        Ok(id)
    }

    pub fn revoke(
        &mut self,
        ctx: &CallContext,
        roles: &RoleAuthority,
        id: CertificateId,
        reason: &str,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let cert = self
            .certificates
            .get_mut(&id)
            .or_not_found(|| id.to_string())?;

        if cert.issuer != ctx.caller && !roles.is_admin(&ctx.caller) {
            return Err(CertchainError::Authorization(format!(
                "only the issuer or the admin may revoke {id}"
            )));
        }
        if cert.status == CertificateStatus::Revoked {
            return Err(CertchainError::StateConflict(format!(
                "{id} is already revoked"
            )));
        }

        cert.status = CertificateStatus::Revoked;
        cert.revocation = Some(Revocation {
            revoked_by: ctx.caller.clone(),
            revoked_at: ctx.now,
            reason: reason.to_string(),
        });
        info!(certificate = id.0, by = %ctx.caller, reason, "certificate revoked");
        events.push(Event::CertificateRevoked {
            certificate_id: id,
            revoked_by: ctx.caller.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    pub fn get(&self, id: CertificateId) -> Result<&Certificate> {
        self.certificates.get(&id).or_not_found(|| id.to_string())
    }

    /// Certificates whose certified entity (owner) is `entity`, ascending.
    pub fn certificates_of(&self, entity: &Principal) -> Vec<CertificateId> {
        self.certificates
            .values()
            .filter(|c| &c.certified_entity == entity)
            .map(|c| c.id)
            .collect()
    }

    pub fn issued_by(&self, issuer: &Principal) -> Vec<CertificateId> {
        self.certificates
            .values()
            .filter(|c| &c.issuer == issuer)
            .map(|c| c.id)
            .collect()
    }
}

impl CertificateValidator for CertificateLedger {
    fn valid(&self, id: CertificateId, now: Timestamp) -> Result<bool> {
        Ok(self.get(id)?.is_valid_at(now))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
