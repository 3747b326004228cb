//! Order-line to query-parameter links.
//!
//! A new-order transaction carries its order-line supply warehouses twice:
//! once as an integer array parameter, and once per order line in the
//! stock lookup, stock update, and order-line insert queries. The i-th array
//! entry corresponds to the i-th occurrence (in query order) of each of those
//! statements. [`OrderLineLinks`] resolves that correspondence once so every
//! write goes through both representations together.

use tracing::trace;

use crate::error::RewriteError;
use crate::trace::{ParamValue, Trace, TransactionTrace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementPattern {
    Prefix(String),
    Exact(String),
}

impl StatementPattern {
    pub fn matches(&self, statement: &str) -> bool {
        match self {
            StatementPattern::Prefix(p) => statement.starts_with(p.as_str()),
            StatementPattern::Exact(e) => statement == e,
        }
    }

    pub fn label(&self) -> String {
        match self {
            StatementPattern::Prefix(p) => format!("{}*", p),
            StatementPattern::Exact(e) => e.clone(),
        }
    }
}

/// Statement family plus the parameter holding the supply warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRule {
    pub pattern: StatementPattern,
    pub param: usize,
}

/// Where the origin warehouse, the supply array, and the linked statement
/// parameters live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineLayout {
    pub warehouse_param: usize,
    pub supply_param: usize,
    pub rules: Vec<LinkRule>,
}

impl Default for OrderLineLayout {
    fn default() -> Self {
        Self {
            warehouse_param: 0,
            supply_param: 5,
            rules: vec![
                LinkRule {
                    pattern: StatementPattern::Prefix("getStockInfo".into()),
                    param: 1,
                },
                LinkRule {
                    pattern: StatementPattern::Exact("updateStock".into()),
                    param: 5,
                },
                LinkRule {
                    pattern: StatementPattern::Exact("createOrderLine".into()),
                    param: 5,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSlot {
    pub query: usize,
    pub param: usize,
}

/// Resolved links for one transaction: for each order line, the query
/// parameters that must always equal its supply warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineLinks {
    origin: i64,
    supply_param: usize,
    lines: Vec<Vec<ParamSlot>>,
}

impl OrderLineLinks {
    pub fn resolve(txn: &TransactionTrace, layout: &OrderLineLayout) -> Result<Self, RewriteError> {
        let origin = txn.int_param(layout.warehouse_param).ok_or_else(|| {
            RewriteError::MalformedTransaction {
                txn_id: txn.id,
                reason: format!("parameter {} is not a warehouse id", layout.warehouse_param),
            }
        })?;
        let supply = txn
            .param(layout.supply_param)
            .and_then(ParamValue::as_int_array)
            .ok_or_else(|| RewriteError::MalformedTransaction {
                txn_id: txn.id,
                reason: format!("parameter {} is not a supply warehouse array", layout.supply_param),
            })?;
        let needed = supply.len();

        let mut lines = vec![Vec::with_capacity(layout.rules.len()); needed];
        for rule in &layout.rules {
            let occurrences: Vec<usize> = txn
                .queries
                .iter()
                .enumerate()
                .filter(|(_, q)| rule.pattern.matches(&q.statement))
                .map(|(i, _)| i)
                .collect();
            if occurrences.len() < needed {
                return Err(RewriteError::OrderLineLinkage {
                    txn_id: txn.id,
                    statement: rule.pattern.label(),
                    needed,
                    found: occurrences.len(),
                });
            }

            for (line, &query) in occurrences.iter().take(needed).enumerate() {
                let q = &txn.queries[query];
                if q.params.len() <= rule.param {
                    return Err(RewriteError::LinkedParameterMissing {
                        txn_id: txn.id,
                        query_id: q.id,
                        index: rule.param,
                    });
                }
                lines[line].push(ParamSlot {
                    query,
                    param: rule.param,
                });
            }
        }

        Ok(Self {
            origin,
            supply_param: layout.supply_param,
            lines,
        })
    }

    /// Origin warehouse of the transaction.
    pub fn origin(&self) -> i64 {
        self.origin
    }

    /// Number of order lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn slots(&self, line: usize) -> &[ParamSlot] {
        self.lines.get(line).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Set order line `line` to `warehouse` in the supply array and in every
    /// linked query parameter.
    pub fn assign(&self, txn: &mut TransactionTrace, line: usize, warehouse: i64) {
        if let Some(supply) = txn
            .params
            .get_mut(self.supply_param)
            .and_then(ParamValue::as_int_array_mut)
        {
            if let Some(entry) = supply.get_mut(line) {
                *entry = warehouse;
            }
        }
        for slot in self.slots(line) {
            if let Some(query) = txn.queries.get_mut(slot.query) {
                query.set_param(slot.param, ParamValue::Int(warehouse));
            }
        }
        trace!(txn_id = txn.id, line, warehouse, "assigned supply warehouse");
    }

    /// True when every linked parameter equals its supply array entry.
    pub fn is_consistent(&self, txn: &TransactionTrace) -> bool {
        let Some(supply) = txn.param(self.supply_param).and_then(ParamValue::as_int_array) else {
            return false;
        };
        self.lines.iter().enumerate().all(|(line, slots)| {
            slots.iter().all(|slot| {
                txn.queries
                    .get(slot.query)
                    .and_then(|q| q.param(slot.param))
                    .and_then(ParamValue::as_int)
                    == supply.get(line).copied()
            })
        })
    }
}

/// Links for every transaction of one procedure, keyed by trace position.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    entries: Vec<(usize, OrderLineLinks)>,
}

impl LinkTable {
    pub fn build(trace: &Trace, procedure: &str, layout: &OrderLineLayout) -> Result<Self, RewriteError> {
        let mut entries = Vec::new();
        for (index, txn) in trace.iter().enumerate() {
            if txn.procedure != procedure {
                continue;
            }
            entries.push((index, OrderLineLinks::resolve(txn, layout)?));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &OrderLineLinks)> + '_ {
        self.entries.iter().map(|(i, l)| (*i, l))
    }
}

/// Check the order-line invariant over every transaction of `procedure`.
pub fn verify_order_lines(trace: &Trace, procedure: &str, layout: &OrderLineLayout) -> Result<bool, RewriteError> {
    let table = LinkTable::build(trace, procedure, layout)?;
    let consistent = table
        .iter()
        .all(|(index, links)| links.is_consistent(&trace.transactions()[index]));
    Ok(consistent)
}
