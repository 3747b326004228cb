//! Corrective swap of the first two parameters of one legacy procedure.
//!
//! Not idempotent: a second application restores the original order, so a
//! trace must go through it exactly once.

use super::{PassKind, PassSummary};
use crate::error::RewriteError;
use crate::trace::{Trace, TransactionTrace};

#[derive(Debug, Clone)]
pub struct LegacySwap {
    procedure: String,
}

impl LegacySwap {
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
        }
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Swap params 0 and 1 if `txn` is the legacy procedure.
    pub fn apply(&self, txn: &mut TransactionTrace) -> Result<bool, RewriteError> {
        if txn.procedure != self.procedure {
            return Ok(false);
        }
        if txn.params.len() < 2 {
            return Err(RewriteError::MalformedTransaction {
                txn_id: txn.id,
                reason: format!("{} has {} parameters, need 2 to swap", self.procedure, txn.params.len()),
            });
        }
        txn.params.swap(0, 1);
        Ok(true)
    }

    pub fn apply_all(&self, trace: &mut Trace) -> Result<PassSummary, RewriteError> {
        let mut summary = PassSummary::new(PassKind::LegacySwap);
        for txn in trace.transactions_mut() {
            if self.apply(txn)? {
                summary.total += 1;
                summary.changed += 1;
            }
        }
        Ok(summary)
    }
}
