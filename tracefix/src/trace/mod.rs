//! Recorded transaction traces.
//!
//! A [`Trace`] is an ordered list of [`TransactionTrace`] records. Queries are
//! owned by the transaction that issued them; the parent of a query is the
//! transaction whose `queries` vector holds it.

use serde::{Deserialize, Serialize};

pub mod io;

pub use io::{load_trace, write_trace, TraceReader, TraceSink, TraceWriter};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i64]> {
        match self {
            ParamValue::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array_mut(&mut self) -> Option<&mut Vec<i64>> {
        match self {
            ParamValue::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntArray(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTrace {
    pub id: u64,
    pub statement: String,
    #[serde(default)]
    pub params: Vec<ParamValue>,
}

impl QueryTrace {
    pub fn new(id: u64, statement: impl Into<String>, params: Vec<ParamValue>) -> Self {
        Self {
            id,
            statement: statement.into(),
            params,
        }
    }

    pub fn param(&self, index: usize) -> Option<&ParamValue> {
        self.params.get(index)
    }

    /// Overwrite parameter `index`; returns false if it does not exist.
    pub fn set_param(&mut self, index: usize, value: ParamValue) -> bool {
        match self.params.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionTrace {
    pub id: u64,
    pub procedure: String,
    #[serde(default)]
    pub params: Vec<ParamValue>,
    #[serde(default)]
    pub queries: Vec<QueryTrace>,
}

impl TransactionTrace {
    pub fn new(id: u64, procedure: impl Into<String>, params: Vec<ParamValue>) -> Self {
        Self {
            id,
            procedure: procedure.into(),
            params,
            queries: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: QueryTrace) -> Self {
        self.queries.push(query);
        self
    }

    pub fn param(&self, index: usize) -> Option<&ParamValue> {
        self.params.get(index)
    }

    pub fn int_param(&self, index: usize) -> Option<i64> {
        self.params.get(index).and_then(ParamValue::as_int)
    }

    /// Overwrite parameter `index`; returns false if it does not exist.
    pub fn set_param(&mut self, index: usize, value: ParamValue) -> bool {
        match self.params.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// An ordered, replayable sequence of transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    transactions: Vec<TransactionTrace>,
}

impl Trace {
    pub fn new(transactions: Vec<TransactionTrace>) -> Self {
        Self { transactions }
    }

    pub fn push(&mut self, txn: TransactionTrace) {
        self.transactions.push(txn);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[TransactionTrace] {
        &self.transactions
    }

    pub fn transactions_mut(&mut self) -> &mut [TransactionTrace] {
        &mut self.transactions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionTrace> {
        self.transactions.iter()
    }

    /// Every query paired with the transaction that owns it, in trace order.
    pub fn queries(&self) -> impl Iterator<Item = (&TransactionTrace, &QueryTrace)> + '_ {
        self.transactions
            .iter()
            .flat_map(|txn| txn.queries.iter().map(move |q| (txn, q)))
    }

    pub fn query_count(&self) -> usize {
        self.transactions.iter().map(|t| t.queries.len()).sum()
    }

    /// Transactions invoking `procedure`.
    pub fn by_procedure<'a>(
        &'a self,
        procedure: &'a str,
    ) -> impl Iterator<Item = &'a TransactionTrace> + 'a {
        self.transactions.iter().filter(move |t| t.procedure == procedure)
    }
}

impl From<Vec<TransactionTrace>> for Trace {
    fn from(transactions: Vec<TransactionTrace>) -> Self {
        Self::new(transactions)
    }
}

impl IntoIterator for Trace {
    type Item = TransactionTrace;
    type IntoIter = std::vec::IntoIter<TransactionTrace>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.into_iter()
    }
}
