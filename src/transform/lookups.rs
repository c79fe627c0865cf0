use std::collections::BTreeMap;

use crate::codebook::{Codebook, LabelMap, RangeMap};
use crate::error::{RebuildError, RebuildResult};
use crate::ingestion::supplementary::SupplementaryData;
use crate::mapping::{LookupSource, LookupSpec};
use crate::sql::{SqlLiteral, TargetTuple};

/// Valid codes of one lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Labels(LabelMap),
    Ranges(RangeMap),
    /// Ids taken from the supplementary reference document.
    Keys(Vec<i64>),
}

impl Lookup {
    pub fn contains(&self, code: i64) -> bool {
        match self {
            Lookup::Labels(m) => m.contains(code),
            Lookup::Ranges(m) => m.contains(code),
            Lookup::Keys(keys) => keys.contains(&code),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Lookup::Labels(m) => m.len(),
            Lookup::Ranges(m) => m.len(),
            Lookup::Keys(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only lookups of a run, keyed by lookup table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookups {
    tables: BTreeMap<String, Lookup>,
}

impl Lookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, lookup: Lookup) {
        self.tables.insert(table.into(), lookup);
    }

    pub fn get(&self, table: &str) -> Option<&Lookup> {
        self.tables.get(table)
    }

    /// `None` if no lookup named `table` is loaded.
    pub fn contains_code(&self, table: &str, code: i64) -> Option<bool> {
        self.tables.get(table).map(|l| l.contains(code))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Rows and valid codes of one lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    pub table: String,
    pub columns: Vec<String>,
    pub tuples: Vec<TargetTuple>,
    pub lookup: Lookup,
}

/// Populate a lookup table from the codebook or the supplementary document.
///
/// Codebook tables are keyed by the decoded integer code. Material tables are keyed by the
/// document's object keys and fuel sources by their 1-based position in the document.
pub fn build_lookup(
    spec: &LookupSpec,
    codebook: &Codebook,
    supplementary: Option<&SupplementaryData>,
) -> RebuildResult<LookupTable> {
    let (tuples, lookup) = match &spec.source {
        LookupSource::CodebookLabels { order } => {
            let labels = codebook.variable(*order)?.labels()?;
            let tuples = labels
                .iter()
                .map(|(code, label)| TargetTuple::new(vec![SqlLiteral::Integer(code), SqlLiteral::text(label)]))
                .collect();
            (tuples, Lookup::Labels(labels))
        }
        LookupSource::CodebookRanges { order } => {
            let ranges = codebook.variable(*order)?.ranges()?;
            let tuples = ranges
                .iter()
                .map(|(code, range)| {
                    TargetTuple::new(vec![
                        SqlLiteral::Integer(code),
                        SqlLiteral::Integer(range.lower),
                        range.upper.map_or(SqlLiteral::Null, SqlLiteral::Integer),
                    ])
                })
                .collect();
            (tuples, Lookup::Ranges(ranges))
        }
        LookupSource::Materials { section, .. } => {
            let entries = require(supplementary, &spec.table)?.materials(section)?;
            let keys = entries.iter().map(|(id, _)| *id).collect();
            let tuples = entries
                .into_iter()
                .map(|(id, entry)| {
                    TargetTuple::new(vec![
                        SqlLiteral::Integer(id),
                        SqlLiteral::Text(entry.name),
                        json_literal(&entry.cost),
                        SqlLiteral::Text(entry.unit),
                    ])
                })
                .collect();
            (tuples, Lookup::Keys(keys))
        }
        LookupSource::FuelSources => {
            let entries = require(supplementary, &spec.table)?.fuel_sources()?;
            let mut keys = Vec::with_capacity(entries.len());
            let mut tuples = Vec::with_capacity(entries.len());
            for (id, (name, entry)) in (1i64..).zip(entries) {
                keys.push(id);
                tuples.push(TargetTuple::new(vec![
                    SqlLiteral::Integer(id),
                    SqlLiteral::Text(name),
                    json_literal(&entry.average_carbon_output),
                    SqlLiteral::Text(entry.unit),
                ]));
            }
            (tuples, Lookup::Keys(keys))
        }
    };

    Ok(LookupTable {
        table: spec.table.clone(),
        columns: spec.columns(),
        tuples,
        lookup,
    })
}

fn require<'a>(
    supplementary: Option<&'a SupplementaryData>,
    table: &str,
) -> RebuildResult<&'a SupplementaryData> {
    supplementary.ok_or_else(|| RebuildError::MissingReferenceData {
        message: format!("lookup table '{table}' needs the supplementary document"),
    })
}

fn json_literal(value: &serde_json::Value) -> SqlLiteral {
    match value {
        serde_json::Value::Null => SqlLiteral::Null,
        serde_json::Value::Bool(b) => SqlLiteral::flag(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlLiteral::Integer(i),
            None => n.as_f64().map_or(SqlLiteral::Null, SqlLiteral::Real),
        },
        serde_json::Value::String(s) => SqlLiteral::Text(s.clone()),
        other => SqlLiteral::Text(other.to_string()),
    }
}
