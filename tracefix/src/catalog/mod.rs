//! Schema catalog: procedures, their statements, and parameter metadata.
//!
//! Loaded from JSON or YAML. Every transaction read from a trace is checked
//! against the catalog before any pass mutates it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::trace::{ParamValue, QueryTrace, TransactionTrace};

/// Declared scalar type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcParameter {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub array: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmtParameter {
    pub kind: ParamKind,
    /// Index of the procedure parameter this statement parameter is bound to.
    #[serde(default)]
    pub proc_parameter: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<StmtParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub partition_parameter: Option<usize>,
    #[serde(default)]
    pub parameters: Vec<ProcParameter>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl Procedure {
    pub fn statement(&self, name: &str) -> Option<&Statement> {
        self.statements.iter().find(|s| s.name == name)
    }

    /// The procedure parameter used for partitioning, if declared.
    pub fn partitioning_parameter(&self) -> Option<(usize, &ProcParameter)> {
        let index = self.partition_parameter?;
        self.parameters.get(index).map(|p| (index, p))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    procedures: Vec<Procedure>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    procedures: Vec<Procedure>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(procedures: Vec<Procedure>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(procedures.len());
        for (i, proc) in procedures.iter().enumerate() {
            if by_name.insert(proc.name.clone(), i).is_some() {
                return Err(CatalogError::DuplicateProcedure(proc.name.clone()));
            }
            if let Some(index) = proc.partition_parameter {
                if index >= proc.parameters.len() {
                    return Err(CatalogError::PartitionParameterOutOfRange {
                        procedure: proc.name.clone(),
                        index,
                        count: proc.parameters.len(),
                    });
                }
            }
        }
        Ok(Self {
            procedures,
            by_name,
        })
    }

    /// Load from a `.yaml`/`.yml` or JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |reason: String| CatalogError::Parse {
            path: path.to_path_buf(),
            reason,
        };
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let doc: CatalogDocument = if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| parse_err(e.to_string()))?
        } else {
            serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))?
        };

        let catalog = Self::new(doc.procedures)?;
        info!(path = %path.display(), procedures = catalog.procedures.len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.by_name.get(name).map(|&i| &self.procedures[i])
    }

    pub fn procedures(&self) -> impl Iterator<Item = &Procedure> + '_ {
        self.procedures.iter()
    }

    /// Check a transaction and its queries against the declared schema.
    pub fn validate_transaction(&self, txn: &TransactionTrace) -> Result<(), CatalogError> {
        let proc = self
            .procedure(&txn.procedure)
            .ok_or_else(|| CatalogError::UnknownProcedure {
                txn_id: txn.id,
                procedure: txn.procedure.clone(),
            })?;

        check_count("transaction", txn.id, proc.parameters.len(), txn.params.len())?;
        for (index, (decl, value)) in proc.parameters.iter().zip(&txn.params).enumerate() {
            if !conforms(decl.kind, decl.array, value) {
                return Err(CatalogError::ParameterType {
                    owner: "transaction",
                    id: txn.id,
                    index,
                    expected: describe(decl.kind, decl.array),
                });
            }
        }

        for query in &txn.queries {
            self.validate_query(proc, query)?;
        }
        Ok(())
    }

    fn validate_query(&self, proc: &Procedure, query: &QueryTrace) -> Result<(), CatalogError> {
        let stmt = proc
            .statement(&query.statement)
            .ok_or_else(|| CatalogError::UnknownStatement {
                query_id: query.id,
                procedure: proc.name.clone(),
                statement: query.statement.clone(),
            })?;

        check_count("query", query.id, stmt.parameters.len(), query.params.len())?;
        for (index, (decl, value)) in stmt.parameters.iter().zip(&query.params).enumerate() {
            if !conforms(decl.kind, false, value) {
                return Err(CatalogError::ParameterType {
                    owner: "query",
                    id: query.id,
                    index,
                    expected: describe(decl.kind, false),
                });
            }
        }
        Ok(())
    }
}

fn check_count(owner: &'static str, id: u64, expected: usize, found: usize) -> Result<(), CatalogError> {
    if expected != found {
        return Err(CatalogError::ParameterCount {
            owner,
            id,
            expected,
            found,
        });
    }
    Ok(())
}

fn conforms(kind: ParamKind, array: bool, value: &ParamValue) -> bool {
    match (kind, array, value) {
        (_, _, ParamValue::Null) => true,
        (ParamKind::Integer, false, ParamValue::Int(_)) => true,
        (ParamKind::Float, false, ParamValue::Int(_) | ParamValue::Float(_)) => true,
        (ParamKind::String, false, ParamValue::Text(_)) => true,
        (ParamKind::Integer, true, ParamValue::IntArray(_)) => true,
        (ParamKind::String, true, ParamValue::TextArray(_)) => true,
        // an empty array decodes as an integer array
        (ParamKind::String, true, ParamValue::IntArray(v)) => v.is_empty(),
        _ => false,
    }
}

fn describe(kind: ParamKind, array: bool) -> String {
    let base = match kind {
        ParamKind::Integer => "integer",
        ParamKind::Float => "float",
        ParamKind::String => "string",
    };
    if array {
        format!("{}[]", base)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_catalog() -> Catalog {
        Catalog::new(vec![Procedure {
            name: "payment".into(),
            system: false,
            partition_parameter: Some(0),
            parameters: vec![
                ProcParameter { name: "w_id".into(), kind: ParamKind::Integer, array: false },
                ProcParameter { name: "amount".into(), kind: ParamKind::Float, array: false },
                ProcParameter { name: "items".into(), kind: ParamKind::Integer, array: true },
            ],
            statements: vec![Statement {
                name: "getWarehouse".into(),
                parameters: vec![StmtParameter { kind: ParamKind::Integer, proc_parameter: Some(0) }],
            }],
        }])
        .unwrap()
    }

    #[test]
    fn accepts_conforming_transaction() {
        let catalog = sample_catalog();
        let txn = TransactionTrace::new(
            1,
            "payment",
            vec![ParamValue::Int(3), ParamValue::Int(10), ParamValue::IntArray(vec![1, 2])],
        )
        .with_query(QueryTrace::new(2, "getWarehouse", vec![ParamValue::Int(3)]));
        catalog.validate_transaction(&txn).unwrap();
    }

    #[test]
    fn rejects_schema_violations() {
        let catalog = sample_catalog();

        let unknown = TransactionTrace::new(1, "nope", vec![]);
        assert!(matches!(
            catalog.validate_transaction(&unknown),
            Err(CatalogError::UnknownProcedure { .. })
        ));

        let short = TransactionTrace::new(1, "payment", vec![ParamValue::Int(3)]);
        assert!(matches!(
            catalog.validate_transaction(&short),
            Err(CatalogError::ParameterCount { expected: 3, found: 1, .. })
        ));

        let wrong_type = TransactionTrace::new(
            1,
            "payment",
            vec![ParamValue::Text("x".into()), ParamValue::Null, ParamValue::IntArray(vec![])],
        );
        assert!(matches!(
            catalog.validate_transaction(&wrong_type),
            Err(CatalogError::ParameterType { index: 0, .. })
        ));

        let bad_query = TransactionTrace::new(
            1,
            "payment",
            vec![ParamValue::Int(3), ParamValue::Float(1.0), ParamValue::IntArray(vec![])],
        )
        .with_query(QueryTrace::new(2, "getDistrict", vec![]));
        assert!(matches!(
            catalog.validate_transaction(&bad_query),
            Err(CatalogError::UnknownStatement { .. })
        ));
    }

    #[test]
    fn rejects_bad_catalog_definitions() {
        let proc = Procedure {
            name: "p".into(),
            system: false,
            partition_parameter: Some(2),
            parameters: vec![],
            statements: vec![],
        };
        assert!(matches!(
            Catalog::new(vec![proc.clone()]),
            Err(CatalogError::PartitionParameterOutOfRange { .. })
        ));

        let ok = Procedure { partition_parameter: None, ..proc };
        assert!(matches!(
            Catalog::new(vec![ok.clone(), ok]),
            Err(CatalogError::DuplicateProcedure(_))
        ));
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("catalog.yaml");
        fs::write(
            &yaml,
            "procedures:\n  - name: payment\n    partition_parameter: 0\n    parameters:\n      - { name: w_id, kind: integer }\n",
        )
        .unwrap();
        let catalog = Catalog::load(&yaml).unwrap();
        let proc = catalog.procedure("payment").unwrap();
        assert_eq!(proc.partitioning_parameter().unwrap().1.name, "w_id");

        let json = dir.path().join("catalog.json");
        fs::write(&json, r#"{"procedures":[{"name":"a","system":true}]}"#).unwrap();
        let catalog = Catalog::load(&json).unwrap();
        assert!(catalog.procedure("a").unwrap().system);

        fs::write(&json, "{").unwrap();
        assert!(matches!(Catalog::load(&json), Err(CatalogError::Parse { .. })));
    }
}
