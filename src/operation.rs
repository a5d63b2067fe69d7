//! Serialisable mutating operations: what a caller submits and what the
//! journal records.

use serde::{Deserialize, Serialize};

use crate::batch::CreateBatch;
use crate::certificate::IssueCertificate;
use crate::events::EventRecord;
use crate::roles::Role;
use crate::types::{BatchId, CertificateId, Principal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    GrantRole {
        principal: Principal,
        role: Role,
    },
    RevokeRole {
        principal: Principal,
        role: Role,
    },
    TransferAdmin {
        new_admin: Principal,
    },
    IssueCertificate(IssueCertificate),
    RevokeCertificate {
        certificate_id: CertificateId,
        reason: String,
    },
    CreateBatch(CreateBatch),
    VerifyBatch {
        batch_id: BatchId,
    },
    LinkCertificate {
        batch_id: BatchId,
        certificate_id: CertificateId,
    },
    MarkInTransit {
        batch_id: BatchId,
    },
    TransferBatch {
        batch_id: BatchId,
        to: Principal,
    },
    CancelBatch {
        batch_id: BatchId,
        reason: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::TransferAdmin { .. } => "transfer_admin",
            Self::IssueCertificate(_) => "issue_certificate",
            Self::RevokeCertificate { .. } => "revoke_certificate",
            Self::CreateBatch(_) => "create_batch",
            Self::VerifyBatch { .. } => "verify_batch",
            Self::LinkCertificate { .. } => "link_certificate",
            Self::MarkInTransit { .. } => "mark_in_transit",
            Self::TransferBatch { .. } => "transfer_batch",
            Self::CancelBatch { .. } => "cancel_batch",
        }
    }
}

/// What an admitted operation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "id", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    CertificateIssued(CertificateId),
    BatchCreated(BatchId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub outcome: Outcome,
    pub events: Vec<EventRecord>,
}
