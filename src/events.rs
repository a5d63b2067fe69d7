//! Notifications emitted by admitted operations.
//!
//! Collaborators (indexers, dashboards) reconcile against the notification
//! log instead of polling asset state.  Each record carries a sequence number
//! assigned by the registry and the host timestamp of the operation that
//! produced it.

use serde::{Deserialize, Serialize};

use crate::batch::BatchStatus;
use crate::roles::Role;
use crate::types::{BatchId, CertificateId, Principal, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    RoleGranted {
        principal: Principal,
        role: Role,
        granted_by: Principal,
    },
    RoleRevoked {
        principal: Principal,
        role: Role,
        revoked_by: Principal,
    },
    AdminTransferred {
        previous: Principal,
        new_admin: Principal,
    },
    CertificateIssued {
        certificate_id: CertificateId,
        external_id: String,
        cert_type: String,
        issuer: Principal,
        certified_entity: Principal,
        expires_at: Timestamp,
    },
    CertificateRevoked {
        certificate_id: CertificateId,
        revoked_by: Principal,
        reason: String,
    },
    BatchCreated {
        batch_id: BatchId,
        external_id: String,
        creator: Principal,
        product_type: String,
        quantity: u64,
        linked_certificates: Vec<CertificateId>,
    },
    BatchVerified {
        batch_id: BatchId,
        verifier: Principal,
    },
    BatchInTransit {
        batch_id: BatchId,
        owner: Principal,
    },
    BatchTransferred {
        batch_id: BatchId,
        from: Principal,
        to: Principal,
        status: BatchStatus,
    },
    BatchCancelled {
        batch_id: BatchId,
        cancelled_by: Principal,
        previous_status: BatchStatus,
        reason: String,
    },
    CertificateLinked {
        batch_id: BatchId,
        certificate_id: CertificateId,
        linked_by: Principal,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoleGranted { .. } => "RoleGranted",
            Self::RoleRevoked { .. } => "RoleRevoked",
            Self::AdminTransferred { .. } => "AdminTransferred",
            Self::CertificateIssued { .. } => "CertificateIssued",
            Self::CertificateRevoked { .. } => "CertificateRevoked",
            Self::BatchCreated { .. } => "BatchCreated",
            Self::BatchVerified { .. } => "BatchVerified",
            Self::BatchInTransit { .. } => "BatchInTransit",
            Self::BatchTransferred { .. } => "BatchTransferred",
            Self::BatchCancelled { .. } => "BatchCancelled",
            Self::CertificateLinked { .. } => "CertificateLinked",
        }
    }
}

/// An event as recorded in the registry's notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: Timestamp,
    #[serde(flatten)]
    pub event: Event,
}
