//! The asset state machine as one value: role authority, certificate ledger,
//! batch ledger, and the notification log.
//!
//! Every mutation goes through [`Registry::apply`] (or a typed wrapper of
//! it).  Components validate fully before their first write, and the
//! registry only appends the notifications an operation produced once it has
//! succeeded, so a rejected operation leaves no trace.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::{Batch, BatchLedger, CreateBatch, Handoff};
use crate::certificate::{
    Certificate, CertificateLedger, CertificateValidator as _, IssueCertificate,
};
use crate::error::{CertchainError, Result};
use crate::events::{Event, EventRecord};
use crate::operation::{Operation, Outcome, Receipt};
use crate::roles::{AuthorityPolicy, Role, RoleAuthority};
use crate::types::{BatchId, CallContext, CertificateId, Principal, Timestamp};
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    roles: RoleAuthority,
    certificates: CertificateLedger,
    batches: BatchLedger,
    log: Vec<EventRecord>,
    next_event_seq: u64,
}

impl Registry {
    pub fn new(admin: Principal, policy: AuthorityPolicy) -> Result<Self> {
        Ok(Self {
            roles: RoleAuthority::new(admin, policy)?,
            certificates: CertificateLedger::new(),
            batches: BatchLedger::new(),
            log: Vec::new(),
            next_event_seq: 1,
        })
    }

    /// Rebuild state from an admitted operation history.  Identical histories
    /// always produce identical registries.
    pub fn replay<'a, I>(admin: Principal, policy: AuthorityPolicy, history: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a CallContext, &'a Operation)>,
    {
        let mut registry = Self::new(admin, policy)?;
        for (ctx, op) in history {
            registry.apply(ctx, op)?;
        }
        Ok(registry)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, ctx: &CallContext, op: &Operation) -> Result<Receipt> {
        let mut events = Vec::new();
        let result = self.dispatch(ctx, op, &mut events);
        match result {
            Ok(outcome) => {
                let records = self.record(ctx.now, events);
                debug!(
                    op = op.name(),
                    caller = %ctx.caller,
                    events = records.len(),
                    "operation admitted"
                );
                Ok(Receipt {
                    outcome,
                    events: records,
                })
            }
            Err(e) => {
                warn!(op = op.name(), caller = %ctx.caller, error = %e, "operation rejected");
                Err(e)
            }
        }
    }

    fn dispatch(
        &mut self,
        ctx: &CallContext,
        op: &Operation,
        events: &mut Vec<Event>,
    ) -> Result<Outcome> {
        let caller = &ctx.caller;
        match op {
            Operation::GrantRole { principal, role } => {
                self.roles.grant(caller, principal, *role, events)?;
            }
            Operation::RevokeRole { principal, role } => {
                self.roles.revoke(caller, principal, *role, events)?;
            }
            Operation::TransferAdmin { new_admin } => {
                self.roles.transfer_admin(caller, new_admin, events)?;
            }
            Operation::IssueCertificate(input) => {
                let id = self.certificates.issue(ctx, &self.roles, input.clone(), events)?;
                return Ok(Outcome::CertificateIssued(id));
            }
            Operation::RevokeCertificate {
                certificate_id,
                reason,
            } => {
                self.certificates.revoke(ctx, &self.roles, *certificate_id, reason, events)?;
            }
            Operation::CreateBatch(input) => {
                let id = self.batches.create(
                    ctx,
                    &self.roles,
                    &self.certificates,
                    input.clone(),
                    events,
                )?;
                return Ok(Outcome::BatchCreated(id));
            }
            Operation::VerifyBatch { batch_id } => {
                self.batches.verify(ctx, &self.roles, *batch_id, events)?;
            }
            Operation::LinkCertificate {
                batch_id,
                certificate_id,
            } => {
                self.batches.link_certificate(
                    ctx,
                    &self.certificates,
                    *batch_id,
                    *certificate_id,
                    events,
                )?;
            }
            Operation::MarkInTransit { batch_id } => {
                self.batches.mark_in_transit(ctx, *batch_id, events)?;
            }
            Operation::TransferBatch { batch_id, to } => {
                self.batches.transfer(ctx, *batch_id, to, events)?;
            }
            Operation::CancelBatch { batch_id, reason } => {
                self.batches.cancel(ctx, &self.roles, *batch_id, reason, events)?;
            }
        }
        Ok(Outcome::Done)
    }

    fn record(&mut self, at: Timestamp, events: Vec<Event>) -> Vec<EventRecord> {
        let records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| {
                let seq = self.next_event_seq;
                self.next_event_seq += 1;
                EventRecord { seq, at, event }
            })
            .collect();
        self.log.extend(records.iter().cloned());
        records
    }

    // -----------------------------------------------------------------------
    // Typed wrappers
    // -----------------------------------------------------------------------

    pub fn grant_role(
        &mut self,
        ctx: &CallContext,
        principal: &Principal,
        role: Role,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::GrantRole {
                principal: principal.clone(),
                role,
            },
        )
        .map(drop)
    }

    pub fn revoke_role(
        &mut self,
        ctx: &CallContext,
        principal: &Principal,
        role: Role,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::RevokeRole {
                principal: principal.clone(),
                role,
            },
        )
        .map(drop)
    }

    pub fn transfer_admin(&mut self, ctx: &CallContext, new_admin: &Principal) -> Result<()> {
        self.apply(
            ctx,
            &Operation::TransferAdmin {
                new_admin: new_admin.clone(),
            },
        )
        .map(drop)
    }

    pub fn issue_certificate(
        &mut self,
        ctx: &CallContext,
        input: IssueCertificate,
    ) -> Result<CertificateId> {
        match self.apply(ctx, &Operation::IssueCertificate(input))?.outcome {
            Outcome::CertificateIssued(id) => Ok(id),
            other => Err(CertchainError::Other(format!("issue produced {other:?}"))),
        }
    }

    pub fn revoke_certificate(
        &mut self,
        ctx: &CallContext,
        certificate_id: CertificateId,
        reason: &str,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::RevokeCertificate {
                certificate_id,
                reason: reason.to_string(),
            },
        )
        .map(drop)
    }

    pub fn create_batch(&mut self, ctx: &CallContext, input: CreateBatch) -> Result<BatchId> {
        match self.apply(ctx, &Operation::CreateBatch(input))?.outcome {
            Outcome::BatchCreated(id) => Ok(id),
            other => Err(CertchainError::Other(format!("create produced {other:?}"))),
        }
    }

    pub fn verify_batch(&mut self, ctx: &CallContext, batch_id: BatchId) -> Result<()> {
        self.apply(ctx, &Operation::VerifyBatch { batch_id }).map(drop)
    }

    pub fn link_certificate(
        &mut self,
        ctx: &CallContext,
        batch_id: BatchId,
        certificate_id: CertificateId,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::LinkCertificate {
                batch_id,
                certificate_id,
            },
        )
        .map(drop)
    }

    pub fn mark_in_transit(&mut self, ctx: &CallContext, batch_id: BatchId) -> Result<()> {
        self.apply(ctx, &Operation::MarkInTransit { batch_id }).map(drop)
    }

    pub fn transfer_batch(
        &mut self,
        ctx: &CallContext,
        batch_id: BatchId,
        to: &Principal,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::TransferBatch {
                batch_id,
                to: to.clone(),
            },
        )
        .map(drop)
    }

    pub fn cancel_batch(
        &mut self,
        ctx: &CallContext,
        batch_id: BatchId,
        reason: &str,
    ) -> Result<()> {
        self.apply(
            ctx,
            &Operation::CancelBatch {
                batch_id,
                reason: reason.to_string(),
            },
        )
        .map(drop)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn roles(&self) -> &RoleAuthority {
        &self.roles
    }

    pub fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.roles.has_role(principal, role)
    }

    pub fn certificate(&self, id: CertificateId) -> Result<&Certificate> {
        self.certificates.get(id)
    }

    pub fn certificate_valid(&self, id: CertificateId, now: Timestamp) -> Result<bool> {
        self.certificates.valid(id, now)
    }

    pub fn certificates(&self) -> &CertificateLedger {
        &self.certificates
    }

    pub fn batch(&self, id: BatchId) -> Result<&Batch> {
        self.batches.get(id)
    }

    pub fn batches(&self) -> &BatchLedger {
        &self.batches
    }

    pub fn custody_trail(&self, id: BatchId) -> Result<&[Handoff]> {
        self.batches.custody_trail(id)
    }

    pub fn list_pending(&self, caller: &Principal) -> Result<Vec<BatchId>> {
        self.batches.list_pending(caller, &self.roles)
    }

    pub fn notifications(&self) -> &[EventRecord] {
        &self.log
    }

    /// Records with a sequence number strictly greater than `seq`.
    pub fn notifications_since(&self, seq: u64) -> &[EventRecord] {
        let start = self.log.partition_point(|r| r.seq <= seq);
        &self.log[start..]
    }

    /// SHA-256 over the canonical JSON of the whole state.  Two executors
    /// that replayed the same history report the same digest.
    pub fn state_digest(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CertchainError::Other(format!("serialize registry: {e}")))?;
        Ok(util::sha256_hex(&json))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
