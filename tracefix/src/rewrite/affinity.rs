//! Synthetic warehouse/partition affinity for new-order order lines.
//!
//! Both modes walk every transaction of the configured procedure once and
//! decide, per order line, whether its supply warehouse stays the origin
//! warehouse or moves to a remote one drawn from the origin's distribution.
//! Every decision is written through [`OrderLineLinks`] so the supply array
//! and the stock/order-line queries never disagree.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use super::linker::{LinkTable, OrderLineLayout};
use super::{PassKind, PassSummary};
use crate::config::AffinityConfig;
use crate::distribution::DistributionMap;
use crate::error::{Result, RewriteError};
use crate::partition::{PartitionHasher, PartitionIndex};
use crate::trace::Trace;

pub struct AffinityRewriter<'a> {
    config: &'a AffinityConfig,
    layout: OrderLineLayout,
    rng: StdRng,
}

impl<'a> AffinityRewriter<'a> {
    pub fn new(config: &'a AffinityConfig, rng: StdRng) -> Self {
        Self {
            config,
            layout: OrderLineLayout::default(),
            rng,
        }
    }

    pub fn with_layout(mut self, layout: OrderLineLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Distinct origin warehouses of qualifying transactions, first-seen order.
    pub fn origin_warehouses(&self, trace: &Trace) -> Result<Vec<i64>> {
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        for txn in trace.by_procedure(&self.config.procedure) {
            let w_id = txn.int_param(self.layout.warehouse_param).ok_or_else(|| {
                RewriteError::MalformedTransaction {
                    txn_id: txn.id,
                    reason: format!("parameter {} is not a warehouse id", self.layout.warehouse_param),
                }
            })?;
            if seen.insert(w_id) {
                ordered.push(w_id);
            }
        }
        Ok(ordered)
    }

    /// Reverse lookup from partition to the warehouses that hash there.
    pub fn build_partition_index(&self, trace: &Trace, hasher: &dyn PartitionHasher) -> Result<PartitionIndex> {
        let mut index = PartitionIndex::new(hasher);
        for w_id in self.origin_warehouses(trace)? {
            index.insert(hasher, w_id);
        }
        Ok(index)
    }

    /// Warehouse mode: one remote warehouse per transaction (with probability
    /// `remote_txn_pct`), then each order line independently moves to it with
    /// probability `remote_item_pct`.
    ///
    /// Remote draws at or beyond the warehouse count wrap to
    /// `(id mod count) + 1`.
    pub fn rewrite_warehouses(
        &mut self,
        trace: &mut Trace,
        distributions: &mut DistributionMap,
    ) -> Result<PassSummary> {
        let warehouses = self.origin_warehouses(trace)?;
        info!("Num of Warehouses: {}", warehouses.len());
        if warehouses.len() > self.config.max_warehouses {
            return Err(RewriteError::TooManyWarehouses {
                found: warehouses.len(),
                limit: self.config.max_warehouses,
            }
            .into());
        }
        if let Some(&key) = warehouses.iter().find(|w| !distributions.contains_key(w)) {
            return Err(RewriteError::MissingDistribution { key }.into());
        }

        let links = LinkTable::build(trace, &self.config.procedure, &self.layout)?;
        let num_warehouses = warehouses.len() as i64;

        let mut summary = PassSummary::new(PassKind::WarehouseAffinity);
        for &w_id in &warehouses {
            summary.histograms.ensure(w_id);
        }

        let rng = &mut self.rng;
        let (txn_pct, item_pct) = (self.config.remote_txn_pct, self.config.remote_item_pct);
        let transactions = trace.transactions_mut();

        for (index, order_lines) in links.iter() {
            let txn = &mut transactions[index];
            let origin = order_lines.origin();
            let dist = distributions
                .get_mut(&origin)
                .ok_or(RewriteError::MissingDistribution { key: origin })?;
            summary.histograms.set_minimum(origin, dist.minimum());

            // all remote order lines of a transaction share one warehouse
            let remote = if roll(rng, txn_pct) {
                let mut w = dist.sample();
                if w >= num_warehouses {
                    w = w.rem_euclid(num_warehouses) + 1;
                }
                summary.histograms.record(origin, w);
                Some(w)
            } else {
                summary.histograms.record(origin, origin);
                None
            };

            let mut updated_items = 0;
            for line in 0..order_lines.len() {
                let supply = match remote {
                    Some(w) if roll(rng, item_pct) => {
                        updated_items += 1;
                        w
                    }
                    _ => origin,
                };
                order_lines.assign(txn, line, supply);
            }

            summary.total += 1;
            if updated_items > 0 {
                summary.changed += 1;
            }
            debug!(txn_id = txn.id, origin, ?remote, updated_items, "warehouse affinity");
        }

        Ok(summary)
    }

    /// Partition mode: each order line independently (with probability
    /// `remote_item_pct`) draws a target partition from the origin
    /// partition's distribution and is supplied by a warehouse chosen
    /// uniformly among those mapping to that partition.
    ///
    /// Each transaction adds one histogram entry under its origin partition:
    /// the first remote target partition, or the origin when no line moved.
    /// Out-of-range partition draws wrap by plain modulo.
    pub fn rewrite_partitions(
        &mut self,
        trace: &mut Trace,
        hasher: &dyn PartitionHasher,
        distributions: &mut DistributionMap,
    ) -> Result<PassSummary> {
        let index = self.build_partition_index(trace, hasher)?;
        let num_partitions = hasher.num_partitions() as i64;
        info!("Num of Partitions: {}", num_partitions);
        info!("\n{}", index);

        let origins: BTreeSet<i64> = self
            .origin_warehouses(trace)?
            .into_iter()
            .map(|w| hasher.partition_of(w) as i64)
            .collect();
        if let Some(&key) = origins.iter().find(|p| !distributions.contains_key(p)) {
            return Err(RewriteError::MissingDistribution { key }.into());
        }

        let links = LinkTable::build(trace, &self.config.procedure, &self.layout)?;

        let mut summary = PassSummary::new(PassKind::PartitionAffinity);
        for partition in 0..num_partitions {
            summary.histograms.ensure(partition);
        }

        let rng = &mut self.rng;
        let item_pct = self.config.remote_item_pct;
        let transactions = trace.transactions_mut();

        for (position, order_lines) in links.iter() {
            let txn = &mut transactions[position];
            let origin_w = order_lines.origin();
            let origin_p = hasher.partition_of(origin_w) as i64;
            let dist = distributions
                .get_mut(&origin_p)
                .ok_or(RewriteError::MissingDistribution { key: origin_p })?;
            summary.histograms.set_minimum(origin_p, dist.minimum());

            // first remote partition of the transaction, if any line moved
            let mut target: Option<i64> = None;
            for line in 0..order_lines.len() {
                if roll(rng, item_pct) {
                    let mut partition = dist.sample();
                    if partition >= num_partitions || partition < 0 {
                        partition = partition.rem_euclid(num_partitions);
                    }
                    target.get_or_insert(partition);

                    let candidates = index.warehouses(partition as u32);
                    if candidates.is_empty() {
                        return Err(RewriteError::EmptyPartition {
                            partition: partition as u32,
                        }
                        .into());
                    }
                    let w_id = candidates[rng.gen_range(0..candidates.len())];
                    order_lines.assign(txn, line, w_id);
                } else {
                    order_lines.assign(txn, line, origin_w);
                }
            }

            summary.histograms.record(origin_p, target.unwrap_or(origin_p));
            summary.total += 1;
            if target.is_some() {
                summary.changed += 1;
            }
        }

        Ok(summary)
    }
}

/// True with probability `pct` percent.
fn roll(rng: &mut StdRng, pct: u8) -> bool {
    rng.gen_range(0..100u32) < pct as u32
}
