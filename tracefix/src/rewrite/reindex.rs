use tracing::debug;

use super::{PassKind, PassSummary};
use crate::error::Result;
use crate::trace::{TraceSink, TransactionTrace};

/// Assigns contiguous ids: each transaction, then its queries in order.
///
/// Only identities change; parameter values pass through untouched.
#[derive(Debug, Clone)]
pub struct Reindexer {
    next_id: u64,
}

impl Reindexer {
    pub fn new(start_id: u64) -> Self {
        Self { next_id: start_id }
    }

    /// The id the next element will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Renumber one transaction and its queries. Returns true if any id moved.
    pub fn renumber(&mut self, txn: &mut TransactionTrace) -> bool {
        let mut moved = txn.id != self.next_id;
        txn.id = self.next_id;
        self.next_id += 1;
        for query in &mut txn.queries {
            moved |= query.id != self.next_id;
            query.id = self.next_id;
            self.next_id += 1;
        }
        moved
    }

    /// Renumber a stream of transactions, handing each one to `sink` as soon
    /// as it has its ids.
    pub fn run<I, S>(&mut self, transactions: I, sink: &mut S) -> Result<PassSummary>
    where
        I: IntoIterator<Item = Result<TransactionTrace>>,
        S: TraceSink + ?Sized,
    {
        let mut summary = PassSummary::new(PassKind::Reindex);
        for txn in transactions {
            let mut txn = txn?;
            if self.renumber(&mut txn) {
                summary.changed += 1;
            }
            sink.write_transaction(&txn)?;
            summary.total += 1;
        }
        debug!(next_id = self.next_id, "reindex complete");
        Ok(summary)
    }
}

impl Default for Reindexer {
    fn default() -> Self {
        Self::new(1)
    }
}
