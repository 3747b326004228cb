//! Error types for the trace rewriter.
//!
//! Configuration-class failures (`CatalogError`, `TraceError`) abort before
//! any transaction is mutated. `RewriteError` covers the data-consistency
//! and sanity-bound conditions that end a pass; the driver surfaces them
//! as a non-zero exit.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error that every module error converts into.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("empty range [{min}, {max})")]
    EmptyRange { min: i64, max: i64 },

    #[error("invalid zipf skew {0} (must be finite and >= 0)")]
    InvalidSkew(f64),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("duplicate procedure '{0}' in catalog")]
    DuplicateProcedure(String),

    #[error("procedure '{procedure}' declares partition parameter {index} but has {count} parameters")]
    PartitionParameterOutOfRange {
        procedure: String,
        index: usize,
        count: usize,
    },

    #[error("transaction {txn_id}: unknown procedure '{procedure}'")]
    UnknownProcedure { txn_id: u64, procedure: String },

    #[error("query {query_id}: statement '{statement}' is not part of procedure '{procedure}'")]
    UnknownStatement {
        query_id: u64,
        procedure: String,
        statement: String,
    },

    #[error("{owner} {id}: expected {expected} parameters, found {found}")]
    ParameterCount {
        owner: &'static str,
        id: u64,
        expected: usize,
        found: usize,
    },

    #[error("{owner} {id}: parameter {index} does not conform to declared type {expected}")]
    ParameterType {
        owner: &'static str,
        id: u64,
        index: usize,
        expected: String,
    },
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to open trace {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: {source}")]
    Read { line: usize, source: std::io::Error },

    #[error("line {line}: malformed transaction: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("failed to encode transaction {txn_id}: {source}")]
    Encode {
        txn_id: u64,
        source: serde_json::Error,
    },

    #[error("failed to publish output {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Fatal conditions raised while rewriting. Each one means the trace or
/// catalog disagrees with the configured affinity model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewriteError {
    #[error("no distribution configured for origin key {key}")]
    MissingDistribution { key: i64 },

    #[error("partition {partition} has no warehouses in the reverse index")]
    EmptyPartition { partition: u32 },

    #[error("transaction {txn_id}: {found} '{statement}' queries for {needed} order lines")]
    OrderLineLinkage {
        txn_id: u64,
        statement: String,
        needed: usize,
        found: usize,
    },

    #[error("transaction {txn_id}: query {query_id} has no parameter {index}")]
    LinkedParameterMissing {
        txn_id: u64,
        query_id: u64,
        index: usize,
    },

    #[error("found {found} distinct warehouses, limit is {limit}")]
    TooManyWarehouses { found: usize, limit: usize },

    #[error("transaction {txn_id}: {reason}")]
    MalformedTransaction { txn_id: u64, reason: String },

    #[error("affinity needs at least two keys, found {0}")]
    NotEnoughKeys(usize),

    #[error("invalid id range [{min}, {max})")]
    InvalidIdRange { min: i64, max: i64 },
}
