//! A registry backed by a journal: state is replayed at open, and every
//! admitted operation is appended before the caller sees its receipt.

use tracing::{error, info};

use crate::error::{CertchainError, Result};
use crate::journal::Journal;
use crate::operation::{Operation, Receipt};
use crate::registry::Registry;
use crate::types::CallContext;

#[derive(Debug)]
pub struct LedgerService {
    journal: Journal,
    registry: Registry,
}

impl LedgerService {
    /// Verify the journal's chain and rebuild the registry from it.
    pub fn open(journal: Journal) -> Result<Self> {
        journal.verify_integrity()?;
        let registry = rebuild(&journal)?;
        info!(
            journal_id = %journal.meta().journal_id,
            certificates = registry.certificates().len(),
            batches = registry.batches().len(),
            "state replayed from journal"
        );
        Ok(Self { journal, registry })
    }

    /// Apply `op` and, if admitted, journal it.  Rejected operations are not
    /// recorded.
    pub fn submit(&mut self, ctx: &CallContext, op: Operation) -> Result<Receipt> {
        let receipt = self.registry.apply(ctx, &op)?;
        if let Err(e) = self.journal.append(ctx, &op) {
            error!(op = op.name(), error = %e, "journal append failed; re-deriving state");
            self.registry = rebuild(&self.journal)?;
            return Err(e);
        }
        Ok(receipt)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

fn rebuild(journal: &Journal) -> Result<Registry> {
    let meta = journal.meta();
    let mut registry = Registry::new(meta.admin.clone(), meta.policy)?;
    for entry in journal.iter_entries()? {
        let op = entry.operation()?;
        registry.apply(&entry.context(), &op).map_err(|e| {
            CertchainError::Journal(format!(
                "journaled {} at seq {} no longer applies: {e}",
                op.name(),
                entry.seq
            ))
        })?;
    }
    Ok(registry)
}
