//! Trace rewriter for OLTP benchmark workloads
//!
//! Rewrites recorded transaction traces to change how often transactions
//! touch remote warehouses or partitions, so a distributed engine can be
//! replayed under different data-locality patterns.
//!
//! # Architecture
//!
//! ```text
//! tracefix
//! ├── distribution/  # Flat and Zipf samplers, per-origin affinity maps
//! ├── histogram/     # Keyed frequency counters and their reporting
//! ├── trace/         # Trace model and JSON Lines reader/writer
//! ├── catalog/       # Procedure/statement schema and trace validation
//! ├── partition.rs   # Warehouse -> partition hashing and reverse index
//! └── rewrite/       # Affinity, parameter expansion, reindex, legacy swap
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use tracefix::{run, RewriteConfig, RewriteJob, RewriteMode};
//!
//! fn main() -> tracefix::Result<()> {
//!     let job = RewriteJob {
//!         catalog: "tpcc.json".into(),
//!         input: "tpcc.trace".into(),
//!         output: "tpcc-renumbered.trace".into(),
//!         mode: RewriteMode::Reindex { start_id: 1 },
//!         fix_legacy_swap: false,
//!         config: RewriteConfig::default(),
//!     };
//!     let report = run(&job)?;
//!     println!("{} passes", report.passes.len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use tracing::info;

pub mod catalog;
pub mod config;
pub mod distribution;
pub mod error;
pub mod histogram;
pub mod partition;
pub mod rewrite;
pub mod trace;

pub use catalog::Catalog;
pub use config::RewriteConfig;
pub use distribution::{DiscreteDistribution, DistributionKind, DistributionMap};
pub use error::{Error, Result, RewriteError};
pub use histogram::{Histogram, HistogramReporter, HistogramSet};
pub use partition::{PartitionHasher, PartitionIndex};
pub use rewrite::{PassKind, PassSummary, RunContext, RunReport};
pub use trace::{ParamValue, QueryTrace, Trace, TransactionTrace};

use distribution::{paired_affinity, zipfian_affinity};
use rewrite::{AffinityRewriter, LegacySwap, ParameterExpander, Reindexer};
use trace::{TraceReader, TraceWriter};

/// Which level the affinity skew is applied at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityTarget {
    Warehouse,
    Partition,
}

/// The single rewrite a run performs.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteMode {
    /// Renumber transactions and queries starting at `start_id`.
    Reindex { start_id: u64 },
    /// Replace partitioning parameters ending in `suffix` with ids in
    /// `[min_id, max_id)`.
    Expand {
        suffix: String,
        min_id: i64,
        max_id: i64,
    },
    /// Skew every origin toward one partner with `Zipf(sigma)`.
    ZipfianAffinity { sigma: f64, target: AffinityTarget },
    /// Pair contiguous partitions with flat distributions.
    PairedAffinity,
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RewriteJob {
    pub catalog: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: RewriteMode,
    /// Apply the legacy parameter swap before the mode
    pub fix_legacy_swap: bool,
    pub config: RewriteConfig,
}

/// Execute `job`: load and validate, rewrite, publish the output trace, then
/// write histograms.
pub fn run(job: &RewriteJob) -> Result<RunReport> {
    let catalog = Catalog::load(&job.catalog)?;
    let mut ctx = RunContext::new(job.config.seed);
    let legacy = job
        .fix_legacy_swap
        .then(|| LegacySwap::new(job.config.legacy.procedure.clone()));
    let config = &job.config;
    let hasher = config.partitions.hasher.build(config.partitions.count);

    match &job.mode {
        RewriteMode::Reindex { start_id } => {
            reindex_streaming(job, &catalog, legacy.as_ref(), *start_id, &mut ctx)?;
        }
        RewriteMode::Expand {
            suffix,
            min_id,
            max_id,
        } => {
            let expander = ParameterExpander::build(&catalog, suffix);
            rewrite_in_memory(job, &catalog, legacy.as_ref(), &mut ctx, |trace, ctx| {
                expander.expand(trace, *min_id, *max_id, ctx.fork_rng())
            })?;
        }
        RewriteMode::ZipfianAffinity {
            sigma,
            target: AffinityTarget::Warehouse,
        } => {
            info!("Adding zipfian warehouse affinity with sigma={}", sigma);
            rewrite_in_memory(job, &catalog, legacy.as_ref(), &mut ctx, |trace, ctx| {
                let mut rewriter = AffinityRewriter::new(&config.affinity, ctx.fork_rng());
                let warehouses = rewriter.origin_warehouses(trace)?;
                let mut distributions = zipfian_affinity(&warehouses, *sigma, &mut ctx.fork_rng())?;
                rewriter.rewrite_warehouses(trace, &mut distributions)
            })?;
        }
        RewriteMode::ZipfianAffinity {
            sigma,
            target: AffinityTarget::Partition,
        } => {
            info!("Adding zipfian partition affinity with sigma={}", sigma);
            rewrite_in_memory(job, &catalog, legacy.as_ref(), &mut ctx, |trace, ctx| {
                let mut rewriter = AffinityRewriter::new(&config.affinity, ctx.fork_rng());
                let partitions: Vec<i64> = (0..hasher.num_partitions() as i64).collect();
                let mut distributions = zipfian_affinity(&partitions, *sigma, &mut ctx.fork_rng())?;
                rewriter.rewrite_partitions(trace, hasher.as_ref(), &mut distributions)
            })?;
        }
        RewriteMode::PairedAffinity => {
            info!("Adding paired partition affinity");
            rewrite_in_memory(job, &catalog, legacy.as_ref(), &mut ctx, |trace, ctx| {
                let mut rewriter = AffinityRewriter::new(&config.affinity, ctx.fork_rng());
                let mut distributions = paired_affinity(hasher.num_partitions(), &mut ctx.fork_rng())?;
                rewriter.rewrite_partitions(trace, hasher.as_ref(), &mut distributions)
            })?;
        }
    }

    let report = ctx.finish();
    persist_histograms(job, &report)?;
    Ok(report)
}

/// Default pass: transactions flow from the reader through validation and
/// renumbering straight into the output, never all held at once.
fn reindex_streaming(
    job: &RewriteJob,
    catalog: &Catalog,
    legacy: Option<&LegacySwap>,
    start_id: u64,
    ctx: &mut RunContext,
) -> Result<()> {
    let reader = TraceReader::open(&job.input)?;
    let mut writer = TraceWriter::create(&job.output)?;
    let mut swapped = PassSummary::new(PassKind::LegacySwap);

    let transactions = reader.map(|item| -> Result<TransactionTrace> {
        let mut txn = item?;
        catalog.validate_transaction(&txn)?;
        if let Some(fix) = legacy {
            if fix.apply(&mut txn)? {
                swapped.total += 1;
                swapped.changed += 1;
            }
        }
        Ok(txn)
    });
    let summary = Reindexer::new(start_id).run(transactions, &mut writer)?;
    let written = writer.finish()?;

    if legacy.is_some() {
        ctx.record(swapped);
    }
    ctx.record(summary);
    info!(path = %job.output.display(), transactions = written, "Wrote updated workload");
    Ok(())
}

/// Load and validate the whole trace, apply the legacy fix, run `pass`, and
/// publish the result with ids unchanged.
fn rewrite_in_memory<F>(
    job: &RewriteJob,
    catalog: &Catalog,
    legacy: Option<&LegacySwap>,
    ctx: &mut RunContext,
    pass: F,
) -> Result<()>
where
    F: FnOnce(&mut Trace, &mut RunContext) -> Result<PassSummary>,
{
    let mut trace = trace::load_trace(&job.input)?;
    for txn in trace.iter() {
        catalog.validate_transaction(txn)?;
    }
    info!(
        transactions = trace.len(),
        queries = trace.query_count(),
        "validated trace"
    );

    if let Some(fix) = legacy {
        ctx.record(fix.apply_all(&mut trace)?);
    }
    let summary = pass(&mut trace, &mut *ctx)?;
    ctx.record(summary);

    let written = trace::write_trace(&job.output, &trace)?;
    info!(path = %job.output.display(), transactions = written, "Wrote updated workload");
    Ok(())
}

fn persist_histograms(job: &RewriteJob, report: &RunReport) -> Result<()> {
    let output = &job.config.output;
    for pass in &report.passes {
        if let Some(ref dir) = output.histogram_dir {
            if !pass.histograms.is_empty() {
                let written = pass.histograms.persist(dir)?;
                info!(dir = %dir.display(), files = written.len(), "saved histograms");
            }
            if let Some(ref histogram) = pass.id_histogram {
                std::fs::create_dir_all(dir)?;
                histogram.save(&dir.join("expanded.hist"), None)?;
            }
        }
    }

    if let Some(ref path) = output.summary_csv {
        let histograms = report.passes.iter().find(|p| !p.histograms.is_empty());
        let expanded = report.passes.iter().find_map(|p| p.id_histogram.as_ref());
        HistogramReporter::write_csv(
            path,
            histograms.map(|p| &p.histograms),
            expanded.map(|h| ("expanded", h)),
        )?;
        info!(path = %path.display(), "wrote histogram summary");
    }

    if let Some(ref path) = output.report_json {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(file, report).map_err(std::io::Error::from)?;
        info!(path = %path.display(), passes = report.passes.len(), "wrote run report");
    }
    Ok(())
}
