//! End-to-end flows over the registry: certification, batch creation,
//! verification and custody.

use anyhow::Result;

use certchain_core::{
    batch::{BatchStatus, CreateBatch},
    certificate::{CertificateStatus, IssueCertificate},
    error::CertchainError,
    registry::Registry,
    roles::{AuthorityPolicy, Role},
    types::{BatchId, CallContext, CertificateId, Principal},
};

const YEAR: u64 = 365 * 24 * 60 * 60;

fn setup() -> Result<Registry> {
    let mut reg = Registry::new(Principal::new("admin"), AuthorityPolicy::full())?;
    let admin = CallContext::new("admin", 1_000);
    reg.grant_role(&admin, &Principal::new("halal-board"), Role::Certifier)?;
    reg.grant_role(&admin, &Principal::new("producer-p"), Role::Producer)?;
    reg.grant_role(&admin, &Principal::new("inspector"), Role::Verifier)?;
    Ok(reg)
}

fn certificate(validity_secs: u64) -> IssueCertificate {
    IssueCertificate {
        external_id: "HALAL-2024-0031".into(),
        cert_type: "Halal".into(),
        certified_entity: Principal::new("producer-p"),
        validity_secs,
        metadata_ref: "ipfs://bafy-halal-0031".into(),
    }
}

fn chicken(certs: Vec<CertificateId>) -> CreateBatch {
    CreateBatch {
        external_id: "CHK-0001".into(),
        product_type: "Whole chicken".into(),
        quantity: 250,
        unit: "kg".into(),
        harvested_at: 900,
        origin: "Selangor".into(),
        linked_certificates: certs,
        metadata_ref: String::new(),
    }
}

#[test]
fn certified_batch_travels_to_consumer() -> Result<()> {
    let mut reg = setup()?;
    let cert = reg.issue_certificate(&CallContext::new("halal-board", 1_000), certificate(YEAR))?;
    assert!(reg.certificate_valid(cert, 1_000)?);

    let batch = reg.create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![cert]))?;
    assert!(reg.certificate_valid(cert, 1_100)?);

    reg.verify_batch(&CallContext::new("inspector", 1_200), batch)?;
    assert!(reg.certificate_valid(cert, 1_200)?);

    let consumer = Principal::new("consumer-c");
    reg.transfer_batch(&CallContext::new("producer-p", 1_300), batch, &consumer)?;

    let b = reg.batch(batch)?;
    assert_eq!(b.status, BatchStatus::Received);
    assert_eq!(b.current_owner, consumer);
    assert_eq!(b.creator, Principal::new("producer-p"));
    assert!(reg.certificate_valid(cert, 1_300)?);
    Ok(())
}

#[test]
fn expired_certificate_stays_linked() -> Result<()> {
    let mut reg = setup()?;
    let cert = reg.issue_certificate(&CallContext::new("halal-board", 1_000), certificate(60))?;
    let batch = reg.create_batch(&CallContext::new("producer-p", 1_010), chicken(vec![cert]))?;
    reg.verify_batch(&CallContext::new("inspector", 1_020), batch)?;

    assert!(!reg.certificate_valid(cert, 1_061)?);
    assert_eq!(reg.certificate(cert)?.status, CertificateStatus::Active);
    assert_eq!(reg.batch(batch)?.linked_certificates, vec![cert]);
    assert_eq!(reg.batch(batch)?.status, BatchStatus::Active);
    Ok(())
}

#[test]
fn revoked_certificate_blocks_creation_without_consuming_an_id() -> Result<()> {
    let mut reg = setup()?;
    let board = CallContext::new("halal-board", 1_000);
    let cert = reg.issue_certificate(&board, certificate(YEAR))?;
    reg.revoke_certificate(&board, cert, "slaughter audit failed")?;

    let next = reg.batches().next_id();
    let err = reg
        .create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![cert]))
        .unwrap_err();
    assert!(matches!(err, CertchainError::Referential(_)));
    assert_eq!(reg.batches().next_id(), next);
    assert!(reg.batches().is_empty());
    Ok(())
}

#[test]
fn non_verifier_cannot_verify() -> Result<()> {
    let mut reg = setup()?;
    let batch = reg.create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![]))?;

    for outsider in ["producer-p", "halal-board", "admin", "stranger"] {
        let err = reg.verify_batch(&CallContext::new(outsider, 1_200), batch).unwrap_err();
        assert!(matches!(err, CertchainError::Authorization(_)), "{outsider}: {err}");
        assert_eq!(reg.batch(batch)?.status, BatchStatus::PendingVerification);
    }
    Ok(())
}

#[test]
fn duplicate_link_is_a_state_conflict() -> Result<()> {
    let mut reg = setup()?;
    let cert = reg.issue_certificate(&CallContext::new("halal-board", 1_000), certificate(YEAR))?;
    let batch = reg.create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![]))?;
    let producer = CallContext::new("producer-p", 1_200);

    reg.link_certificate(&producer, batch, cert)?;
    assert_eq!(reg.batch(batch)?.linked_certificates.len(), 1);

    let err = reg.link_certificate(&producer, batch, cert).unwrap_err();
    assert!(matches!(err, CertchainError::StateConflict(_)));
    assert_eq!(reg.batch(batch)?.linked_certificates.len(), 1);
    Ok(())
}

#[test]
fn in_transit_leg_and_custody_trail() -> Result<()> {
    let mut reg = setup()?;
    let batch = reg.create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![]))?;
    reg.verify_batch(&CallContext::new("inspector", 1_200), batch)?;

    reg.mark_in_transit(&CallContext::new("producer-p", 1_300), batch)?;
    assert_eq!(reg.batch(batch)?.status, BatchStatus::InTransit);

    let carrier = Principal::new("cold-chain-logistics");
    reg.transfer_batch(&CallContext::new("producer-p", 1_400), batch, &carrier)?;
    let trail = reg.custody_trail(batch)?;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].from, Principal::new("producer-p"));
    assert_eq!(trail[0].to, carrier);
    assert_eq!(trail[0].at, 1_400);
    assert_eq!(reg.batches().owned_by(&carrier), vec![batch]);
    Ok(())
}

#[test]
fn pending_queue_follows_verification_and_cancellation() -> Result<()> {
    let mut reg = setup()?;
    let producer = CallContext::new("producer-p", 1_100);
    let a = reg.create_batch(&producer, chicken(vec![]))?;
    let b = reg.create_batch(&producer, chicken(vec![]))?;
    let c = reg.create_batch(&producer, chicken(vec![]))?;
    assert_eq!((a, b, c), (BatchId(1), BatchId(2), BatchId(3)));

    let inspector = Principal::new("inspector");
    assert_eq!(reg.list_pending(&inspector)?, vec![a, b, c]);

    reg.verify_batch(&CallContext::new("inspector", 1_200), b)?;
    reg.cancel_batch(&producer, c, "label misprint")?;
    assert_eq!(reg.list_pending(&inspector)?, vec![a]);

    let err = reg.list_pending(&Principal::new("producer-p")).unwrap_err();
    assert!(matches!(err, CertchainError::Authorization(_)));
    Ok(())
}

#[test]
fn revoked_role_loses_access() -> Result<()> {
    let mut reg = setup()?;
    let admin = CallContext::new("admin", 1_000);
    reg.revoke_role(&admin, &Principal::new("producer-p"), Role::Producer)?;

    let err = reg
        .create_batch(&CallContext::new("producer-p", 1_100), chicken(vec![]))
        .unwrap_err();
    assert!(matches!(err, CertchainError::Authorization(_)));
    Ok(())
}

#[test]
fn admin_transfer_moves_role_management() -> Result<()> {
    let mut reg = setup()?;
    reg.transfer_admin(&CallContext::new("admin", 1_000), &Principal::new("ministry"))?;
    assert_eq!(reg.roles().admin(), &Principal::new("ministry"));

    let err = reg
        .grant_role(&CallContext::new("admin", 1_001), &Principal::new("x"), Role::Verifier)
        .unwrap_err();
    assert!(matches!(err, CertchainError::Authorization(_)));

    reg.grant_role(&CallContext::new("ministry", 1_002), &Principal::new("x"), Role::Verifier)?;
    assert!(reg.has_role(&Principal::new("x"), Role::Verifier));
    Ok(())
}
