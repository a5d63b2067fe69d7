//! External batch references: `{base_url}/verify/{batch_id}`.

use crate::error::{CertchainError, Result};
use crate::types::BatchId;

pub fn verify_url(base_url: &str, id: BatchId) -> String {
    format!("{}/verify/{}", base_url.trim_end_matches('/'), id.0)
}

/// Accept either a bare batch id or a verification URL.
pub fn parse_batch_reference(reference: &str) -> Result<BatchId> {
    let reference = reference.trim();
    let tail = match reference.rfind("/verify/") {
        Some(pos) => &reference[pos + "/verify/".len()..],
        None => reference,
    };
    let tail = tail.trim_end_matches('/');
    tail.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(BatchId)
        .ok_or_else(|| {
            CertchainError::Validation(format!("'{reference}' is not a batch reference"))
        })
}
