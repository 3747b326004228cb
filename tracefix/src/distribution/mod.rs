use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as RandDist, Zipf};

use crate::error::DistributionError;

pub mod affinity;

pub use affinity::{paired_affinity, zipfian_affinity, DistributionMap};

/// Shape of a discrete distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistributionKind {
    /// Uniform over `[min, max)`.
    Flat,
    /// Mass proportional to `rank^-sigma`, rank 1 being `min`.
    Zipf { sigma: f64 },
}

/// A bounded integer sampler that owns its RNG state.
///
/// Two instances never share randomness: each is handed its own `StdRng`
/// (see [`fork_rng`]), so a draw sequence depends only on the seed it was
/// created with and the number of draws taken from it.
#[derive(Debug, Clone)]
pub struct DiscreteDistribution {
    kind: DistributionKind,
    min: i64,
    max: i64,
    rng: StdRng,
    zipf: Option<Zipf<f64>>,
}

impl DiscreteDistribution {
    pub fn flat(min: i64, max: i64, rng: StdRng) -> Result<Self, DistributionError> {
        check_range(min, max)?;
        Ok(Self {
            kind: DistributionKind::Flat,
            min,
            max,
            rng,
            zipf: None,
        })
    }

    pub fn zipf(min: i64, max: i64, sigma: f64, rng: StdRng) -> Result<Self, DistributionError> {
        check_range(min, max)?;
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(DistributionError::InvalidSkew(sigma));
        }
        let span = (max - min) as u64;
        let zipf = Zipf::new(span, sigma).map_err(|_| DistributionError::InvalidSkew(sigma))?;

        Ok(Self {
            kind: DistributionKind::Zipf { sigma },
            min,
            max,
            rng,
            zipf: Some(zipf),
        })
    }

    /// Take one draw in `[min, max)`.
    pub fn sample(&mut self) -> i64 {
        match self.zipf {
            Some(ref dist) => {
                // Zipf yields ranks in 1..=span as floats
                let rank = dist.sample(&mut self.rng) as i64;
                let offset = (rank - 1).clamp(0, self.max - self.min - 1);
                self.min + offset
            }
            None => self.rng.gen_range(self.min..self.max),
        }
    }

    pub fn minimum(&self) -> i64 {
        self.min
    }

    pub fn maximum(&self) -> i64 {
        self.max
    }

    pub fn kind(&self) -> DistributionKind {
        self.kind
    }
}

impl std::fmt::Display for DiscreteDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DistributionKind::Flat => write!(f, "Flat[{}, {})", self.min, self.max),
            DistributionKind::Zipf { sigma } => {
                write!(f, "Zipf[{}, {}) sigma={}", self.min, self.max, sigma)
            }
        }
    }
}

/// Derive an independent generator from `parent`.
pub fn fork_rng(parent: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(parent.gen())
}

fn check_range(min: i64, max: i64) -> Result<(), DistributionError> {
    if min >= max {
        return Err(DistributionError::EmptyRange { min, max });
    }
    Ok(())
}
