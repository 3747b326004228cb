//! Builders for per-origin distribution maps.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::{fork_rng, DiscreteDistribution};
use crate::error::{Result, RewriteError};

/// Origin key (warehouse or partition id) to the distribution that picks its
/// remote counterpart.
pub type DistributionMap = BTreeMap<i64, DiscreteDistribution>;

/// Skew every key toward one randomly chosen partner.
///
/// Key `k` gets `Zipf(o, o + |keys|, sigma)` where `o` is another key picked
/// uniformly, so `o` is the most likely draw for `k`.
pub fn zipfian_affinity(keys: &[i64], sigma: f64, rng: &mut StdRng) -> Result<DistributionMap> {
    if keys.len() < 2 {
        return Err(RewriteError::NotEnoughKeys(keys.len()).into());
    }
    let span = keys.len() as i64;

    let mut distributions = DistributionMap::new();
    for &key in keys {
        let partners: Vec<i64> = keys.iter().copied().filter(|&o| o != key).collect();
        if partners.is_empty() {
            return Err(RewriteError::NotEnoughKeys(1).into());
        }
        let partner = partners[rng.gen_range(0..partners.len())];
        debug!(key, partner, "zipfian affinity");

        let dist = DiscreteDistribution::zipf(partner, partner + span, sigma, fork_rng(rng))?;
        distributions.insert(key, dist);
    }
    Ok(distributions)
}

/// Pair contiguous partitions `(0, 1), (2, 3), ...` and give each member a
/// flat distribution over every partition. A trailing odd partition is left
/// without a distribution.
pub fn paired_affinity(num_partitions: u32, rng: &mut StdRng) -> Result<DistributionMap> {
    let n = num_partitions as i64;
    let mut distributions = DistributionMap::new();
    let mut pending: Option<i64> = None;

    for partition in 0..n {
        match pending.take() {
            Some(previous) => {
                distributions.insert(partition, DiscreteDistribution::flat(0, n, fork_rng(rng))?);
                distributions.insert(previous, DiscreteDistribution::flat(0, n, fork_rng(rng))?);
            }
            None => pending = Some(partition),
        }
    }
    Ok(distributions)
}
