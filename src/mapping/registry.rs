use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RebuildError, RebuildResult};
use crate::sql::{DependencyGraph, TableRole};
use crate::types::Schema;

use super::{LookupSpec, RuleKind, TableMapping};

/// Validated set of lookup declarations and table mappings.
///
/// Construction validates every declaration once; lookups after that are infallible apart from
/// asking for a table that was never registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegistryDocument", into = "RegistryDocument")]
pub struct MappingRegistry {
    lookups: Vec<LookupSpec>,
    mappings: Vec<TableMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    lookups: Vec<LookupSpec>,
    tables: Vec<TableMapping>,
}

impl TryFrom<RegistryDocument> for MappingRegistry {
    type Error = RebuildError;

    fn try_from(doc: RegistryDocument) -> Result<Self, Self::Error> {
        MappingRegistry::new(doc.lookups, doc.tables)
    }
}

impl From<MappingRegistry> for RegistryDocument {
    fn from(reg: MappingRegistry) -> Self {
        RegistryDocument {
            lookups: reg.lookups,
            tables: reg.mappings,
        }
    }
}

impl MappingRegistry {
    /// Validate and build a registry.
    pub fn new(lookups: Vec<LookupSpec>, mappings: Vec<TableMapping>) -> RebuildResult<Self> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for name in lookups
            .iter()
            .map(|l| l.table.as_str())
            .chain(mappings.iter().map(|m| m.table.as_str()))
        {
            if !names.insert(name) {
                return Err(invalid(name, "table registered more than once"));
            }
        }

        for mapping in &mappings {
            validate_mapping(mapping, &names)?;
        }

        Ok(Self { lookups, mappings })
    }

    /// Parse a registry from its JSON form (`{"lookups": [...], "tables": [...]}`).
    pub fn from_json_str(input: &str) -> RebuildResult<Self> {
        let doc: RegistryDocument = serde_json::from_str(input)?;
        doc.try_into()
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> RebuildResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> RebuildResult<String> {
        Ok(serde_json::to_string_pretty(&RegistryDocument::from(self.clone()))?)
    }

    /// Mapping for a fact/junction table.
    pub fn mapping_for(&self, table: &str) -> RebuildResult<&TableMapping> {
        self.mappings
            .iter()
            .find(|m| m.table == table)
            .ok_or_else(|| RebuildError::UnknownTable {
                table: table.to_string(),
            })
    }

    /// Declaration of a lookup table.
    pub fn lookup_for(&self, table: &str) -> RebuildResult<&LookupSpec> {
        self.lookups
            .iter()
            .find(|l| l.table == table)
            .ok_or_else(|| RebuildError::UnknownTable {
                table: table.to_string(),
            })
    }

    pub fn mappings(&self) -> &[TableMapping] {
        &self.mappings
    }

    pub fn lookups(&self) -> &[LookupSpec] {
        &self.lookups
    }

    pub fn contains(&self, table: &str) -> bool {
        self.lookups.iter().any(|l| l.table == table) || self.mappings.iter().any(|m| m.table == table)
    }

    /// All registered table names: lookups first, then mappings, each in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.lookups
            .iter()
            .map(|l| l.table.as_str())
            .chain(self.mappings.iter().map(|m| m.table.as_str()))
            .collect()
    }

    /// Numeric schema of every source column the mappings read, in first-use order.
    pub fn source_schema(&self) -> Schema {
        let mut columns: Vec<&str> = Vec::new();
        for source in self.mappings.iter().flat_map(|m| m.required_sources()) {
            if !columns.contains(&source) {
                columns.push(source);
            }
        }
        Schema::numeric(columns)
    }

    /// Dependency graph implied by the declarations.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for lookup in &self.lookups {
            graph.add_table(&lookup.table, TableRole::Lookup);
        }
        for mapping in &self.mappings {
            graph.add_table(&mapping.table, mapping.role);
            for referenced in mapping.referenced_tables() {
                graph.add_dependency(&mapping.table, referenced);
            }
        }
        graph
    }
}

fn validate_mapping(mapping: &TableMapping, known: &BTreeSet<&str>) -> RebuildResult<()> {
    let table = mapping.table.as_str();
    if mapping.rules.is_empty() {
        return Err(invalid(table, "no column rules"));
    }

    let mut targets: BTreeSet<&str> = BTreeSet::new();
    let mut pivots = 0usize;
    for rule in &mapping.rules {
        if !targets.insert(rule.target.as_str()) {
            return Err(invalid(table, &format!("duplicate target column '{}'", rule.target)));
        }
        match &rule.kind {
            RuleKind::PivotIndicator { .. } => {
                pivots += 1;
                if rule.sources.is_empty() {
                    return Err(invalid(
                        table,
                        &format!("pivot column '{}' has no indicator columns", rule.target),
                    ));
                }
            }
            RuleKind::SentinelRemap { sentinels, .. } => {
                if sentinels.iter().any(|s| !s.code.is_finite()) {
                    return Err(invalid(
                        table,
                        &format!("column '{}' has a non-finite sentinel code", rule.target),
                    ));
                }
            }
            _ => {}
        }
        if !rule.is_pivot() && rule.sources.len() != 1 {
            return Err(invalid(
                table,
                &format!(
                    "column '{}' must read exactly one source column, got {}",
                    rule.target,
                    rule.sources.len()
                ),
            ));
        }
    }
    if pivots > 1 {
        return Err(invalid(table, "more than one pivot rule"));
    }

    let consumed: BTreeSet<&str> = mapping
        .rules
        .iter()
        .flat_map(|r| r.sources.iter().map(String::as_str))
        .collect();
    if !consumed.contains(mapping.row_id.as_str()) {
        return Err(invalid(
            table,
            &format!("row identifier '{}' is not read by any rule", mapping.row_id),
        ));
    }
    if let Some(col) = mapping
        .skip_when_all_null
        .iter()
        .find(|c| !consumed.contains(c.as_str()))
    {
        return Err(invalid(
            table,
            &format!("skip column '{col}' is not read by any rule"),
        ));
    }

    if let Some(missing) = mapping
        .referenced_tables()
        .into_iter()
        .find(|t| !known.contains(t))
    {
        return Err(invalid(
            table,
            &format!("references unregistered table '{missing}'"),
        ));
    }

    Ok(())
}

fn invalid(table: &str, message: &str) -> RebuildError {
    RebuildError::InvalidMapping {
        table: table.to_string(),
        message: message.to_string(),
    }
}
