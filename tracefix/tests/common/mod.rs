//! Fixtures shared by the integration tests: a small TPC-C/TM1 catalog and
//! trace builders that conform to it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracefix::trace::write_trace;
use tracefix::{ParamValue, QueryTrace, RewriteConfig, RewriteJob, RewriteMode, Trace, TransactionTrace};

pub const MAX_LINES: usize = 15;

fn int(bound: Option<usize>) -> Value {
    match bound {
        Some(index) => json!({ "kind": "integer", "proc_parameter": index }),
        None => json!({ "kind": "integer" }),
    }
}

pub fn catalog_json() -> Value {
    let mut neworder_statements = vec![
        json!({ "name": "getWarehouseTaxRate", "parameters": [int(Some(0))] }),
        json!({ "name": "getItemInfo", "parameters": [int(None)] }),
        json!({ "name": "updateStock", "parameters": [int(None), int(None), int(None), int(None), int(None), int(None)] }),
        json!({
            "name": "createOrderLine",
            "parameters": [int(None), int(None), int(Some(0)), int(None), int(None), int(None), int(None)]
        }),
    ];
    for line in 1..=MAX_LINES {
        neworder_statements.push(json!({
            "name": format!("getStockInfo{:02}", line),
            "parameters": [int(None), int(None)]
        }));
    }

    json!({
        "procedures": [
            {
                "name": "neworder",
                "partition_parameter": 0,
                "parameters": [
                    { "name": "w_id", "kind": "integer" },
                    { "name": "d_id", "kind": "integer" },
                    { "name": "c_id", "kind": "integer" },
                    { "name": "o_entry_d", "kind": "string" },
                    { "name": "i_ids", "kind": "integer", "array": true },
                    { "name": "i_w_ids", "kind": "integer", "array": true },
                    { "name": "i_quantities", "kind": "integer", "array": true }
                ],
                "statements": neworder_statements
            },
            {
                "name": "payment",
                "partition_parameter": 0,
                "parameters": [
                    { "name": "w_id", "kind": "integer" },
                    { "name": "d_id", "kind": "integer" },
                    { "name": "h_amount", "kind": "float" }
                ],
                "statements": [
                    { "name": "getWarehouse", "parameters": [int(Some(0))] },
                    { "name": "updateWarehouseBalance", "parameters": [{ "kind": "float" }, int(Some(0))] }
                ]
            },
            {
                "name": "UpdateSubscriberData",
                "partition_parameter": 0,
                "parameters": [
                    { "name": "s_id", "kind": "integer" },
                    { "name": "bit_1", "kind": "integer" },
                    { "name": "data_a", "kind": "integer" }
                ],
                "statements": [
                    { "name": "updateSubscriber", "parameters": [int(None), int(None)] }
                ]
            },
            {
                "name": "@Statistics",
                "system": true,
                "parameters": [{ "name": "component", "kind": "string" }]
            }
        ]
    })
}

pub fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("catalog.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&catalog_json()).unwrap()).unwrap();
    path
}

/// A new-order transaction whose every order line is supplied by its home
/// warehouse.
pub fn neworder(id: u64, warehouse: i64, lines: usize) -> TransactionTrace {
    assert!(lines <= MAX_LINES);
    let int = ParamValue::Int;
    let mut txn = TransactionTrace::new(
        id,
        "neworder",
        vec![
            int(warehouse),
            int(1),
            int(7),
            ParamValue::Text("2024-01-01 00:00:00".into()),
            ParamValue::IntArray((1..=lines as i64).map(|i| i * 11).collect()),
            ParamValue::IntArray(vec![warehouse; lines]),
            ParamValue::IntArray(vec![5; lines]),
        ],
    );
    let mut qid = id * 1000;
    let mut next = || {
        qid += 1;
        qid
    };
    txn.queries
        .push(QueryTrace::new(next(), "getWarehouseTaxRate", vec![int(warehouse)]));
    for line in 0..lines {
        let item = (line as i64 + 1) * 11;
        txn.queries.push(QueryTrace::new(next(), "getItemInfo", vec![int(item)]));
        txn.queries.push(QueryTrace::new(
            next(),
            format!("getStockInfo{:02}", line + 1),
            vec![int(item), int(warehouse)],
        ));
        txn.queries.push(QueryTrace::new(
            next(),
            "updateStock",
            vec![int(20), int(5), int(1), int(0), int(item), int(warehouse)],
        ));
        txn.queries.push(QueryTrace::new(
            next(),
            "createOrderLine",
            vec![int(1), int(1), int(warehouse), int(line as i64 + 1), int(item), int(warehouse), int(5)],
        ));
    }
    txn
}

pub fn payment(id: u64, warehouse: i64) -> TransactionTrace {
    TransactionTrace::new(
        id,
        "payment",
        vec![ParamValue::Int(warehouse), ParamValue::Int(3), ParamValue::Float(12.5)],
    )
    .with_query(QueryTrace::new(id * 1000 + 1, "getWarehouse", vec![ParamValue::Int(warehouse)]))
    .with_query(QueryTrace::new(
        id * 1000 + 2,
        "updateWarehouseBalance",
        vec![ParamValue::Float(12.5), ParamValue::Int(warehouse)],
    ))
}

pub fn update_subscriber(id: u64, s_id: i64, bit: i64) -> TransactionTrace {
    TransactionTrace::new(
        id,
        "UpdateSubscriberData",
        vec![ParamValue::Int(s_id), ParamValue::Int(bit), ParamValue::Int(42)],
    )
    .with_query(QueryTrace::new(
        id * 1000 + 1,
        "updateSubscriber",
        vec![ParamValue::Int(bit), ParamValue::Int(s_id)],
    ))
}

/// A mixed workload over `warehouses` warehouses, new-orders interleaved with
/// payments.
pub fn mixed_trace(transactions: u64, warehouses: i64) -> Trace {
    let mut trace = Trace::default();
    for id in 1..=transactions {
        let warehouse = (id as i64 % warehouses) + 1;
        if id % 3 == 0 {
            trace.push(payment(id, warehouse));
        } else {
            trace.push(neworder(id, warehouse, 1 + (id as usize % 10)));
        }
    }
    trace
}

pub fn write_input(dir: &Path, name: &str, trace: &Trace) -> PathBuf {
    let path = dir.join(name);
    write_trace(&path, trace).unwrap();
    path
}

/// A job reading `input.trace` and writing `output.trace` in `dir`, with
/// histograms under `dir/histograms`.
pub fn job(dir: &Path, mode: RewriteMode) -> RewriteJob {
    let mut config = RewriteConfig::default();
    config.output.histogram_dir = Some(dir.join("histograms"));
    RewriteJob {
        catalog: dir.join("catalog.json"),
        input: dir.join("input.trace"),
        output: dir.join("output.trace"),
        mode,
        fix_legacy_swap: false,
        config,
    }
}

/// Supply warehouse of every order line as seen by the array parameter and by
/// each linked statement.
pub fn order_line_views(txn: &TransactionTrace) -> Vec<[i64; 4]> {
    let supply = txn.params[5].as_int_array().unwrap().to_vec();
    let stock: Vec<i64> = statement_param(txn, |s| s.starts_with("getStockInfo"), 1);
    let update: Vec<i64> = statement_param(txn, |s| s == "updateStock", 5);
    let create: Vec<i64> = statement_param(txn, |s| s == "createOrderLine", 5);
    (0..supply.len())
        .map(|i| [supply[i], stock[i], update[i], create[i]])
        .collect()
}

fn statement_param(txn: &TransactionTrace, select: impl Fn(&str) -> bool, index: usize) -> Vec<i64> {
    txn.queries
        .iter()
        .filter(|q| select(&q.statement))
        .map(|q| q.params[index].as_int().unwrap())
        .collect()
}

pub fn assert_linked(txn: &TransactionTrace) {
    for (line, views) in order_line_views(txn).iter().enumerate() {
        assert!(
            views.iter().all(|&w| w == views[0]),
            "txn {} line {} disagrees: {:?}",
            txn.id,
            line,
            views
        );
    }
}
