//! Spread transactions across a wider id range by rewriting the partitioning
//! parameter and every statement parameter bound to it.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::{PassKind, PassSummary};
use crate::catalog::{Catalog, ParamKind};
use crate::distribution::DiscreteDistribution;
use crate::error::{Result, RewriteError};
use crate::histogram::Histogram;
use crate::trace::{ParamValue, Trace};

/// Statement parameters to rewrite for one procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionTarget {
    pub partition_param: usize,
    /// Statement name to the indexes of its parameters bound to the
    /// partitioning parameter.
    pub statements: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterExpander {
    targets: BTreeMap<String, ExpansionTarget>,
}

impl ParameterExpander {
    /// Select every non-system procedure whose partitioning parameter name
    /// ends with `suffix` (case-insensitive).
    ///
    /// Only integer partitioning parameters are supported; others are
    /// skipped with a warning.
    pub fn build(catalog: &Catalog, suffix: &str) -> Self {
        let suffix = suffix.to_lowercase();
        let mut targets = BTreeMap::new();

        for proc in catalog.procedures() {
            if proc.system {
                continue;
            }
            let Some((partition_param, param)) = proc.partitioning_parameter() else {
                continue;
            };
            if !param.name.to_lowercase().ends_with(&suffix) {
                continue;
            }
            if param.kind != ParamKind::Integer || param.array {
                warn!(procedure = %proc.name, param = %param.name, "skipping non-integer partitioning parameter");
                continue;
            }

            let mut statements = HashMap::new();
            for stmt in &proc.statements {
                let bound: Vec<usize> = stmt
                    .parameters
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.proc_parameter == Some(partition_param))
                    .map(|(i, _)| i)
                    .collect();
                if !bound.is_empty() {
                    statements.insert(stmt.name.clone(), bound);
                }
            }
            debug!(procedure = %proc.name, statements = statements.len(), "expansion target");
            targets.insert(
                proc.name.clone(),
                ExpansionTarget {
                    partition_param,
                    statements,
                },
            );
        }

        info!(procedures = targets.len(), "Expanding partitioning parameters using '{}'", suffix);
        Self { targets }
    }

    pub fn target(&self, procedure: &str) -> Option<&ExpansionTarget> {
        self.targets.get(procedure)
    }

    pub fn procedures(&self) -> impl Iterator<Item = &str> + '_ {
        self.targets.keys().map(String::as_str)
    }

    /// Give each targeted transaction a fresh id drawn uniformly from
    /// `[min_id, max_id)`.
    pub fn expand(&self, trace: &mut Trace, min_id: i64, max_id: i64, rng: StdRng) -> Result<PassSummary> {
        if min_id >= max_id {
            return Err(RewriteError::InvalidIdRange {
                min: min_id,
                max: max_id,
            }
            .into());
        }
        let mut ids = DiscreteDistribution::flat(min_id, max_id, rng)?;
        let mut histogram = Histogram::new();
        let mut summary = PassSummary::new(PassKind::ParameterExpansion);

        for txn in trace.transactions_mut() {
            let Some(target) = self.targets.get(&txn.procedure) else {
                continue;
            };
            summary.total += 1;

            let new_id = ids.sample();
            txn.set_param(target.partition_param, ParamValue::Int(new_id));
            histogram.record(new_id);

            for query in &mut txn.queries {
                if let Some(indexes) = target.statements.get(&query.statement) {
                    for &index in indexes {
                        query.set_param(index, ParamValue::Int(new_id));
                    }
                }
            }
            summary.changed += 1;
        }

        summary.id_histogram = Some(histogram);
        Ok(summary)
    }
}
