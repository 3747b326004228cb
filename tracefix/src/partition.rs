//! Warehouse to partition assignment, and the reverse lookup built from a trace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maps a warehouse id onto one of `num_partitions()` partitions. Must be a
/// pure function for the lifetime of a run.
pub trait PartitionHasher {
    fn num_partitions(&self) -> u32;
    fn partition_of(&self, warehouse: i64) -> u32;
}

/// `warehouse mod n`, never negative.
#[derive(Debug, Clone, Copy)]
pub struct ModuloHasher {
    partitions: u32,
}

impl ModuloHasher {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }
}

impl PartitionHasher for ModuloHasher {
    fn num_partitions(&self) -> u32 {
        self.partitions
    }

    fn partition_of(&self, warehouse: i64) -> u32 {
        warehouse.rem_euclid(self.partitions as i64) as u32
    }
}

/// xxh3 over the little-endian id, modulo the partition count.
#[derive(Debug, Clone, Copy)]
pub struct Xxh3Hasher {
    partitions: u32,
}

impl Xxh3Hasher {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }
}

impl PartitionHasher for Xxh3Hasher {
    fn num_partitions(&self) -> u32 {
        self.partitions
    }

    fn partition_of(&self, warehouse: i64) -> u32 {
        let hash = xxhash_rust::xxh3::xxh3_64(&warehouse.to_le_bytes());
        (hash % self.partitions as u64) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HasherKind {
    #[default]
    Modulo,
    Xxh3,
}

impl HasherKind {
    pub fn build(self, partitions: u32) -> Box<dyn PartitionHasher> {
        match self {
            HasherKind::Modulo => Box::new(ModuloHasher::new(partitions)),
            HasherKind::Xxh3 => Box::new(Xxh3Hasher::new(partitions)),
        }
    }
}

/// Partition id to the warehouses (first-seen order) that hash to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionIndex {
    warehouses: BTreeMap<u32, Vec<i64>>,
}

impl PartitionIndex {
    /// An index with an empty slot for every partition of `hasher`.
    pub fn new(hasher: &dyn PartitionHasher) -> Self {
        let warehouses = (0..hasher.num_partitions()).map(|p| (p, Vec::new())).collect();
        Self { warehouses }
    }

    pub fn insert(&mut self, hasher: &dyn PartitionHasher, warehouse: i64) {
        let slot = self.warehouses.entry(hasher.partition_of(warehouse)).or_default();
        if !slot.contains(&warehouse) {
            slot.push(warehouse);
        }
    }

    /// Warehouses mapping to `partition`; empty if none were seen.
    pub fn warehouses(&self, partition: u32) -> &[i64] {
        self.warehouses.get(&partition).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[i64])> + '_ {
        self.warehouses.iter().map(|(&p, w)| (p, w.as_slice()))
    }
}

impl fmt::Display for PartitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Partition ID -> Warehouse ID")?;
        for (partition, warehouses) in self.iter() {
            writeln!(f, "{}: {:?}", partition, warehouses)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_is_euclidean() {
        let h = ModuloHasher::new(4);
        assert_eq!(h.partition_of(5), 1);
        assert_eq!(h.partition_of(8), 0);
        assert_eq!(h.partition_of(-1), 3);
        assert_eq!(ModuloHasher::new(0).num_partitions(), 1);
    }

    #[test]
    fn xxh3_is_stable_and_in_range() {
        let h = Xxh3Hasher::new(7);
        for w in 0..200 {
            let p = h.partition_of(w);
            assert!(p < 7);
            assert_eq!(p, h.partition_of(w));
        }
    }

    #[test]
    fn index_keeps_first_seen_order_without_duplicates() {
        let hasher = ModuloHasher::new(3);
        let mut index = PartitionIndex::new(&hasher);
        for w in [4, 1, 7, 4, 2] {
            index.insert(&hasher, w);
        }
        assert_eq!(index.warehouses(1), &[4, 1, 7]);
        assert_eq!(index.warehouses(2), &[2]);
        assert!(index.warehouses(0).is_empty());
        assert!(index.warehouses(9).is_empty());
        assert_eq!(index.iter().count(), 3);
        assert!(index.to_string().starts_with("Partition ID -> Warehouse ID\n0: []\n"));
    }
}
