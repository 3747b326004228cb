use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

pub mod affinity;
pub mod expander;
pub mod legacy;
pub mod linker;
pub mod reindex;

pub use affinity::AffinityRewriter;
pub use expander::ParameterExpander;
pub use legacy::LegacySwap;
pub use linker::{verify_order_lines, LinkTable, OrderLineLayout, OrderLineLinks};
pub use reindex::Reindexer;

use crate::distribution::fork_rng;
use crate::histogram::{Histogram, HistogramReporter, HistogramSet};

/// Which rewrite a pass performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassKind {
    LegacySwap,
    Reindex,
    ParameterExpansion,
    WarehouseAffinity,
    PartitionAffinity,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::LegacySwap => "legacy_swap",
            PassKind::Reindex => "reindex",
            PassKind::ParameterExpansion => "parameter_expansion",
            PassKind::WarehouseAffinity => "warehouse_affinity",
            PassKind::PartitionAffinity => "partition_affinity",
        }
    }
}

/// Outcome of one pass over the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassSummary {
    pub kind: PassKind,
    /// Transactions the pass considered
    pub total: u64,
    /// Transactions it modified
    pub changed: u64,
    /// Per-origin histograms (affinity passes)
    pub histograms: HistogramSet,
    /// Histogram of generated ids (parameter expansion)
    pub id_histogram: Option<Histogram>,
}

impl PassSummary {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            total: 0,
            changed: 0,
            histograms: HistogramSet::new(),
            id_histogram: None,
        }
    }

    pub fn log(&self) {
        info!(
            pass = self.kind.as_str(),
            changed = self.changed,
            total = self.total,
            "Updated {}/{} transactions",
            self.changed,
            self.total
        );
        if !self.histograms.is_empty() {
            HistogramReporter::log_set("Histograms", &self.histograms);
        }
        if let Some(ref histogram) = self.id_histogram {
            HistogramReporter::log_single("Expanded id histogram", histogram);
        }
    }
}

/// Run-scoped state threaded through every pass: the seeded generator that
/// feeds all randomness, and the summaries collected so far.
pub struct RunContext {
    rng: StdRng,
    passes: Vec<PassSummary>,
}

impl RunContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            passes: Vec::new(),
        }
    }

    /// An independent generator for one consumer. Consumers must be forked in
    /// a fixed order for runs to be reproducible.
    pub fn fork_rng(&mut self) -> StdRng {
        fork_rng(&mut self.rng)
    }

    pub fn record(&mut self, summary: PassSummary) {
        summary.log();
        self.passes.push(summary);
    }

    pub fn finish(self) -> RunReport {
        RunReport {
            passes: self.passes,
        }
    }
}

/// Everything a run produced besides the rewritten trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub passes: Vec<PassSummary>,
}

impl RunReport {
    pub fn pass(&self, kind: PassKind) -> Option<&PassSummary> {
        self.passes.iter().find(|p| p.kind == kind)
    }
}
