//! Batch asset class: two-phase creation, custody, and certificate links.
//!
//! ```text
//! PendingVerification --verify--> Active --mark_in_transit--> InTransit --transfer--> Received
//!                                 Active --transfer--> Received
//! {PendingVerification, Active, InTransit, Received} --cancel--> Cancelled (terminal)
//! ```
//!
//! Certificates are checked through an injected [`CertificateValidator`]
//! at the moment they are linked and never re-checked afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::certificate::CertificateValidator;
use crate::error::{CertchainError, OptionExt as _, Result};
use crate::events::Event;
use crate::roles::{Role, RoleAuthority};
use crate::types::{BatchId, CallContext, CertificateId, Principal, Timestamp};
use crate::util;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    PendingVerification,
    Active,
    InTransit,
    Received,
    Cancelled,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingVerification => write!(f, "pending verification"),
            Self::Active => write!(f, "active"),
            Self::InTransit => write!(f, "in transit"),
            Self::Received => write!(f, "received"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One change of ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    pub from: Principal,
    pub to: Principal,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub external_id: String,
    pub creator: Principal,
    pub product_type: String,
    pub quantity: u64,
    pub unit: String,
    pub created_at: Timestamp,
    pub harvested_at: Timestamp,
    pub origin: String,
    pub status: BatchStatus,
    /// Insertion-ordered, duplicate-free.
    pub linked_certificates: Vec<CertificateId>,
    pub current_owner: Principal,
    pub metadata_ref: String,
    #[serde(default)]
    pub custody: Vec<Handoff>,
}

impl Batch {
    pub fn is_linked(&self, cert: CertificateId) -> bool {
        self.linked_certificates.contains(&cert)
    }
}

/// Arguments of [`BatchLedger::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub external_id: String,
    pub product_type: String,
    pub quantity: u64,
    pub unit: String,
    pub harvested_at: Timestamp,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub linked_certificates: Vec<CertificateId>,
    #[serde(default)]
    pub metadata_ref: String,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLedger {
    next_id: BatchId,
    batches: BTreeMap<BatchId, Batch>,
    /// Ids currently in `PendingVerification`, kept in step with every
    /// status transition.
    pending: BTreeSet<BatchId>,
}

impl Default for BatchLedger {
    fn default() -> Self {
        Self {
            next_id: BatchId::FIRST,
            batches: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// The id the next successful `create` will assign.
    pub fn next_id(&self) -> BatchId {
        self.next_id
    }

    pub fn get(&self, id: BatchId) -> Result<&Batch> {
        self.batches.get(&id).or_not_found(|| id.to_string())
    }

    fn get_mut(&mut self, id: BatchId) -> Result<&mut Batch> {
        self.batches.get_mut(&id).or_not_found(|| id.to_string())
    }

    pub fn create<V>(
        &mut self,
        ctx: &CallContext,
        roles: &RoleAuthority,
        validator: &V,
        input: CreateBatch,
        events: &mut Vec<Event>,
    ) -> Result<BatchId>
    where
        V: CertificateValidator + ?Sized,
    {
        roles.require_role(&ctx.caller, Role::Producer)?;
        util::require_non_empty(&input.external_id, "batch external id")?;
        util::require_non_empty(&input.product_type, "product type")?;
        util::require_non_empty(&input.unit, "unit")?;
        if input.quantity == 0 {
            return Err(CertchainError::Validation(
                "quantity must be greater than zero".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for cert in &input.linked_certificates {
            if !seen.insert(*cert) {
                return Err(CertchainError::Validation(format!(
                    "{cert} listed more than once"
                )));
            }
        }
        for cert in &input.linked_certificates {
            require_valid(validator, *cert, ctx.now)?;
        }

        let id = self.next_id;
        let batch = Batch {
            id,
            external_id: input.external_id,
            creator: ctx.caller.clone(),
            product_type: input.product_type,
            quantity: input.quantity,
            unit: input.unit,
            created_at: ctx.now,
            harvested_at: input.harvested_at,
            origin: input.origin,
            status: BatchStatus::PendingVerification,
            linked_certificates: input.linked_certificates,
            current_owner: ctx.caller.clone(),
            metadata_ref: input.metadata_ref,
            custody: Vec::new(),
        };

        info!(
            batch = id.0,
            creator = %batch.creator,
            product = %batch.product_type,
            quantity = batch.quantity,
            certificates = batch.linked_certificates.len(),
            "batch created"
        );
        events.push(Event::BatchCreated {
            batch_id: id,
            external_id: batch.external_id.clone(),
            creator: batch.creator.clone(),
            product_type: batch.product_type.clone(),
            quantity: batch.quantity,
            linked_certificates: batch.linked_certificates.clone(),
        });
        self.batches.insert(id, batch);
        self.pending.insert(id);
        self.next_id = id.next();
        Ok(id)
    }

    pub fn verify(
        &mut self,
        ctx: &CallContext,
        roles: &RoleAuthority,
        id: BatchId,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        roles.require_role(&ctx.caller, Role::Verifier)?;
        let batch = self.get_mut(id)?;
        if batch.status != BatchStatus::PendingVerification {
            return Err(CertchainError::StateConflict(format!(
                "{id} is {}, not pending verification",
                batch.status
            )));
        }

        batch.status = BatchStatus::Active;
        self.pending.remove(&id);
        info!(batch = id.0, verifier = %ctx.caller, "batch verified");
        events.push(Event::BatchVerified {
            batch_id: id,
            verifier: ctx.caller.clone(),
        });
        Ok(())
    }

    pub fn link_certificate<V>(
        &mut self,
        ctx: &CallContext,
        validator: &V,
        id: BatchId,
        cert: CertificateId,
        events: &mut Vec<Event>,
    ) -> Result<()>
    where
        V: CertificateValidator + ?Sized,
    {
        let batch = self.get_mut(id)?;
        if batch.creator != ctx.caller && batch.current_owner != ctx.caller {
            return Err(CertchainError::Authorization(format!(
                "only the creator or current owner may link certificates to {id}"
            )));
        }
        if batch.status == BatchStatus::Cancelled {
            return Err(CertchainError::StateConflict(format!("{id} is cancelled")));
        }
        require_valid(validator, cert, ctx.now)?;
        if batch.is_linked(cert) {
            return Err(CertchainError::StateConflict(format!(
                "{cert} is already linked to {id}"
            )));
        }

        batch.linked_certificates.push(cert);
        info!(batch = id.0, certificate = cert.0, "certificate linked");
        events.push(Event::CertificateLinked {
            batch_id: id,
            certificate_id: cert,
            linked_by: ctx.caller.clone(),
        });
        Ok(())
    }

    pub fn mark_in_transit(
        &mut self,
        ctx: &CallContext,
        id: BatchId,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let batch = self.get_mut(id)?;
        require_owner(batch, &ctx.caller)?;
        if batch.status != BatchStatus::Active {
            return Err(CertchainError::StateConflict(format!(
                "{id} is {}, only active batches can go in transit",
                batch.status
            )));
        }

        batch.status = BatchStatus::InTransit;
        info!(batch = id.0, owner = %ctx.caller, "batch in transit");
        events.push(Event::BatchInTransit {
            batch_id: id,
            owner: ctx.caller.clone(),
        });
        Ok(())
    }

    /// Hand the batch to `to`.  Whether `to` is a logistics party or the
    /// final consumer, the batch ends up `Received`.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        id: BatchId,
        to: &Principal,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let batch = self.get_mut(id)?;
        require_owner(batch, &ctx.caller)?;
        to.ensure_not_null("recipient")?;
        if !matches!(batch.status, BatchStatus::Active | BatchStatus::InTransit) {
            return Err(CertchainError::StateConflict(format!(
                "{id} is {}, only active or in-transit batches can be transferred",
                batch.status
            )));
        }

        let from = std::mem::replace(&mut batch.current_owner, to.clone());
        batch.status = BatchStatus::Received;
        batch.custody.push(Handoff {
            from: from.clone(),
            to: to.clone(),
            at: ctx.now,
        });
        info!(batch = id.0, %from, %to, "batch transferred");
        events.push(Event::BatchTransferred {
            batch_id: id,
            from,
            to: to.clone(),
            status: BatchStatus::Received,
        });
        Ok(())
    }

    /// Cancel from any non-terminal status.  The creator keeps this right
    /// even after the batch has changed hands.
    pub fn cancel(
        &mut self,
        ctx: &CallContext,
        roles: &RoleAuthority,
        id: BatchId,
        reason: &str,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        let batch = self.get_mut(id)?;
        if batch.creator != ctx.caller
            && batch.current_owner != ctx.caller
            && !roles.is_admin(&ctx.caller)
        {
            return Err(CertchainError::Authorization(format!(
                "only the creator, current owner or admin may cancel {id}"
            )));
        }
        if batch.status == BatchStatus::Cancelled {
            return Err(CertchainError::StateConflict(format!(
                "{id} is already cancelled"
            )));
        }

        let previous_status = std::mem::replace(&mut batch.status, BatchStatus::Cancelled);
        self.pending.remove(&id);
        info!(batch = id.0, by = %ctx.caller, %previous_status, reason, "batch cancelled");
        events.push(Event::BatchCancelled {
            batch_id: id,
            cancelled_by: ctx.caller.clone(),
            previous_status,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Batches awaiting verification, ascending.  Verifier-only.
    pub fn list_pending(&self, caller: &Principal, roles: &RoleAuthority) -> Result<Vec<BatchId>> {
        roles.require_role(caller, Role::Verifier)?;
        debug!(count = self.pending.len(), "listing pending batches");
        Ok(self.pending.iter().copied().collect())
    }

    pub fn owned_by(&self, owner: &Principal) -> Vec<BatchId> {
        self.batches
            .values()
            .filter(|b| &b.current_owner == owner)
            .map(|b| b.id)
            .collect()
    }

    pub fn custody_trail(&self, id: BatchId) -> Result<&[Handoff]> {
        Ok(&self.get(id)?.custody)
    }
}

fn require_owner(batch: &Batch, caller: &Principal) -> Result<()> {
    if &batch.current_owner != caller {
        return Err(CertchainError::Authorization(format!(
            "{caller} is not the current owner of {}",
            batch.id
        )));
    }
    Ok(())
}

/// Unknown and invalid certificates are both referential failures here.
fn require_valid<V>(validator: &V, cert: CertificateId, now: Timestamp) -> Result<()>
where
    V: CertificateValidator + ?Sized,
{
    match validator.valid(cert, now) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CertchainError::Referential(format!(
            "{cert} is revoked or expired"
        ))),
        Err(CertchainError::NotFound(_)) => Err(CertchainError::Referential(format!(
            "{cert} does not exist"
        ))),
        Err(other) => Err(other),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptionExt as _;
    use crate::roles::AuthorityPolicy;

    /// Validator backed by a fixed table: present ids map to their validity.
    struct FakeValidator(BTreeMap<CertificateId, bool>);

    impl FakeValidator {
        fn with(entries: &[(u64, bool)]) -> Self {
            Self(entries.iter().map(|(id, ok)| (CertificateId(*id), *ok)).collect())
        }
    }

    impl CertificateValidator for FakeValidator {
        fn valid(&self, id: CertificateId, _now: Timestamp) -> Result<bool> {
            self.0.get(&id).copied().or_not_found(|| id.to_string())
        }
    }

    fn roles() -> RoleAuthority {
        let admin = Principal::new("admin");
        let mut roles = RoleAuthority::new(admin.clone(), AuthorityPolicy::full()).unwrap();
        let mut ev = Vec::new();
        roles.grant(&admin, &Principal::new("farm"), Role::Producer, &mut ev).unwrap();
        roles.grant(&admin, &Principal::new("inspector"), Role::Verifier, &mut ev).unwrap();
        roles
    }

    fn dates(certs: Vec<u64>) -> CreateBatch {
        CreateBatch {
            external_id: "DATES-2024-07".into(),
            product_type: "Medjool dates".into(),
            quantity: 500,
            unit: "kg".into(),
            harvested_at: 50,
            origin: "Al-Qassim".into(),
            linked_certificates: certs.into_iter().map(CertificateId).collect(),
            metadata_ref: String::new(),
        }
    }

    fn farm(now: Timestamp) -> CallContext {
        CallContext::new("farm", now)
    }

    fn created_and_verified(ledger: &mut BatchLedger, roles: &RoleAuthority) -> BatchId {
        let v = FakeValidator::with(&[(1, true)]);
        let id = ledger.create(&farm(100), roles, &v, dates(vec![1]), &mut Vec::new()).unwrap();
        ledger.verify(&CallContext::new("inspector", 110), roles, id, &mut Vec::new()).unwrap();
        id
    }

    #[test]
    fn create_starts_pending_and_owned_by_creator() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[(1, true), (2, true)]);
        let mut events = Vec::new();

        let id = ledger.create(&farm(100), &roles, &v, dates(vec![1, 2]), &mut events).unwrap();
        let b = ledger.get(id).unwrap();
        assert_eq!(id, BatchId(1));
        assert_eq!(b.status, BatchStatus::PendingVerification);
        assert_eq!(b.creator, Principal::new("farm"));
        assert_eq!(b.current_owner, Principal::new("farm"));
        assert_eq!(b.created_at, 100);
        assert_eq!(b.linked_certificates, vec![CertificateId(1), CertificateId(2)]);
        assert_eq!(
            ledger.list_pending(&Principal::new("inspector"), &roles).unwrap(),
            vec![id]
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn create_rejects_bad_input() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[(1, true)]);
        let mut events = Vec::new();

        let mut zero = dates(vec![]);
        zero.quantity = 0;
        assert!(matches!(
            ledger.create(&farm(1), &roles, &v, zero, &mut events),
            Err(CertchainError::Validation(_))
        ));

        let mut blank = dates(vec![]);
        blank.external_id = " ".into();
        assert!(matches!(
            ledger.create(&farm(1), &roles, &v, blank, &mut events),
            Err(CertchainError::Validation(_))
        ));

        assert!(matches!(
            ledger.create(&farm(1), &roles, &v, dates(vec![1, 1]), &mut events),
            Err(CertchainError::Validation(_))
        ));

        assert!(matches!(
            ledger.create(
                &CallContext::new("inspector", 1),
                &roles,
                &v,
                dates(vec![]),
                &mut events,
            ),
            Err(CertchainError::Authorization(_))
        ));
        assert!(ledger.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn create_is_atomic_on_referential_failure() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[(1, true), (2, true), (3, false)]);
        let mut events = Vec::new();

        let err = ledger
            .create(&farm(1), &roles, &v, dates(vec![1, 2, 3]), &mut events)
            .unwrap_err();
        assert!(matches!(err, CertchainError::Referential(_)));
        let err = ledger.create(&farm(1), &roles, &v, dates(vec![1, 42]), &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::Referential(_)));

        assert!(ledger.is_empty());
        assert_eq!(ledger.next_id(), BatchId(1));
        assert!(events.is_empty());
        let id = ledger.create(&farm(2), &roles, &v, dates(vec![1]), &mut events).unwrap();
        assert_eq!(id, BatchId(1));
    }

    #[test]
    fn verify_once_only_by_verifier() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[]);
        let id = ledger.create(&farm(1), &roles, &v, dates(vec![]), &mut Vec::new()).unwrap();

        let err = ledger.verify(&farm(2), &roles, id, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CertchainError::Authorization(_)));
        assert_eq!(ledger.get(id).unwrap().status, BatchStatus::PendingVerification);

        let inspector = CallContext::new("inspector", 3);
        ledger.verify(&inspector, &roles, id, &mut Vec::new()).unwrap();
        let err = ledger.verify(&inspector, &roles, id, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));
        assert_eq!(ledger.get(id).unwrap().status, BatchStatus::Active);
        assert!(ledger.list_pending(&inspector.caller, &roles).unwrap().is_empty());

        assert!(matches!(
            ledger.verify(&inspector, &roles, BatchId(77), &mut Vec::new()),
            Err(CertchainError::NotFound(_))
        ));
    }

    #[test]
    fn transit_then_transfer_ends_received() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let id = created_and_verified(&mut ledger, &roles);
        let mut events = Vec::new();

        ledger.mark_in_transit(&farm(120), id, &mut events).unwrap();
        assert_eq!(ledger.get(id).unwrap().status, BatchStatus::InTransit);
        let err = ledger.mark_in_transit(&farm(121), id, &mut events).unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));

        let shop = Principal::new("shop");
        ledger.transfer(&farm(130), id, &shop, &mut events).unwrap();
        let b = ledger.get(id).unwrap();
        assert_eq!(b.status, BatchStatus::Received);
        assert_eq!(b.current_owner, shop);
        assert_eq!(
            ledger.custody_trail(id).unwrap(),
            &[Handoff {
                from: Principal::new("farm"),
                to: shop.clone(),
                at: 130,
            }]
        );
        assert_eq!(ledger.owned_by(&shop), vec![id]);

        // Received is not transferable again.
        let err = ledger
            .transfer(&CallContext::new("shop", 140), id, &Principal::new("home"), &mut events)
            .unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));
    }

    #[test]
    fn transfer_guards() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[]);
        let pending = ledger.create(&farm(1), &roles, &v, dates(vec![]), &mut Vec::new()).unwrap();
        let active = created_and_verified(&mut ledger, &roles);
        let mut events = Vec::new();

        assert!(matches!(
            ledger.transfer(&farm(2), pending, &Principal::new("shop"), &mut events),
            Err(CertchainError::StateConflict(_))
        ));
        assert!(matches!(
            ledger.transfer(
                &CallContext::new("inspector", 2),
                active,
                &Principal::new("shop"),
                &mut events,
            ),
            Err(CertchainError::Authorization(_))
        ));
        assert!(matches!(
            ledger.transfer(&farm(2), active, &Principal::new(""), &mut events),
            Err(CertchainError::Validation(_))
        ));
        assert!(matches!(
            ledger.mark_in_transit(&CallContext::new("shop", 2), active, &mut events),
            Err(CertchainError::Authorization(_))
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn link_certificate_rules() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let id = created_and_verified(&mut ledger, &roles);
        let v = FakeValidator::with(&[(1, true), (2, true), (3, false)]);
        let mut events = Vec::new();

        ledger.link_certificate(&farm(200), &v, id, CertificateId(2), &mut events).unwrap();
        let err = ledger
            .link_certificate(&farm(201), &v, id, CertificateId(2), &mut events)
            .unwrap_err();
        assert!(matches!(err, CertchainError::StateConflict(_)));
        // Already linked at creation.
        assert!(matches!(
            ledger.link_certificate(&farm(201), &v, id, CertificateId(1), &mut events),
            Err(CertchainError::StateConflict(_))
        ));
        assert!(matches!(
            ledger.link_certificate(&farm(201), &v, id, CertificateId(3), &mut events),
            Err(CertchainError::Referential(_))
        ));
        assert!(matches!(
            ledger.link_certificate(
                &CallContext::new("inspector", 201),
                &v,
                id,
                CertificateId(2),
                &mut events,
            ),
            Err(CertchainError::Authorization(_))
        ));
        assert_eq!(
            ledger.get(id).unwrap().linked_certificates,
            vec![CertificateId(1), CertificateId(2)]
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn creator_can_still_link_and_cancel_after_transfer() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let id = created_and_verified(&mut ledger, &roles);
        let v = FakeValidator::with(&[(2, true)]);
        let mut events = Vec::new();

        ledger.transfer(&farm(150), id, &Principal::new("shop"), &mut events).unwrap();
        ledger.link_certificate(&farm(151), &v, id, CertificateId(2), &mut events).unwrap();
        ledger.cancel(&farm(152), &roles, id, "mislabelled", &mut events).unwrap();
        assert_eq!(ledger.get(id).unwrap().status, BatchStatus::Cancelled);
        assert_eq!(ledger.get(id).unwrap().current_owner, Principal::new("shop"));
    }

    #[test]
    fn cancel_rules() {
        let roles = roles();
        let mut ledger = BatchLedger::new();
        let v = FakeValidator::with(&[(1, true)]);
        let id = ledger.create(&farm(1), &roles, &v, dates(vec![]), &mut Vec::new()).unwrap();
        let mut events = Vec::new();

        assert!(matches!(
            ledger.cancel(&CallContext::new("inspector", 2), &roles, id, "x", &mut events),
            Err(CertchainError::Authorization(_))
        ));
        let admin = CallContext::new("admin", 2);
        ledger.cancel(&admin, &roles, id, "duplicate entry", &mut events).unwrap();
        assert!(ledger.list_pending(&Principal::new("inspector"), &roles).unwrap().is_empty());

        assert!(matches!(
            ledger.cancel(&farm(3), &roles, id, "again", &mut events),
            Err(CertchainError::StateConflict(_))
        ));
        assert!(matches!(
            ledger.verify(&CallContext::new("inspector", 3), &roles, id, &mut events),
            Err(CertchainError::StateConflict(_))
        ));
        assert!(matches!(
            ledger.link_certificate(&farm(3), &v, id, CertificateId(1), &mut events),
            Err(CertchainError::StateConflict(_))
        ));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn list_pending_requires_verifier() {
        let roles = roles();
        let ledger = BatchLedger::new();
        assert!(matches!(
            ledger.list_pending(&Principal::new("farm"), &roles),
            Err(CertchainError::Authorization(_))
        ));
    }
}
