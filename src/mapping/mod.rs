//! Declarative column mappings.
//!
//! A [`TableMapping`] describes one target table: its ordered [`ColumnRule`]s, the source column
//! that identifies rows in error messages, an optional all-null skip group and its place in the
//! dependency graph. Mappings are plain data (`serde`), so a registry can be declared in JSON and
//! new tables added without touching the transformer.
//!
//! Lookup (dimension) tables are declared separately as [`LookupSpec`]s; they are populated from
//! the codebook or the supplementary reference document rather than from dataset rows.

mod registry;
mod survey;

use serde::{Deserialize, Serialize};

use crate::sql::TableRole;

pub use registry::MappingRegistry;

/// One target column and how it is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Target column name.
    pub target: String,
    /// Source column code(s). Exactly one, except for [`RuleKind::PivotIndicator`].
    pub sources: Vec<String>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

/// Transformation applied by a [`ColumnRule`].
///
/// Null policy: an absent source value renders as `NULL` for every kind except
/// [`RuleKind::PivotIndicator`], where it simply contributes no tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Copy the stored numeric value through as a real literal.
    Rename,
    /// Integer code. A fractional value is a data fault, never truncated.
    IntCast {
        /// Render as a quoted text literal (`'12'`) instead of `12`.
        #[serde(default)]
        text: bool,
        /// Lookup table the code must exist in.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        references: Option<String>,
    },
    /// Ternary text flag: `'True'`, `'False'` or `NULL`.
    BoolFlag {
        #[serde(default)]
        truth: FlagTest,
    },
    /// Fixed code → literal replacements, checked before the integer rule.
    SentinelRemap {
        sentinels: Vec<Sentinel>,
        /// Fall-through integers render as quoted text.
        #[serde(default)]
        text: bool,
    },
    /// Wide-to-narrow pivot: one tuple per source column equal to `1`, carrying the column's
    /// 1-based position in `sources`.
    PivotIndicator {
        group: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        references: Option<String>,
    },
}

/// Which present values count as "true" for a [`RuleKind::BoolFlag`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagTest {
    /// Value equals the given code.
    Equals(f64),
    /// Value is strictly below the given code.
    Below(f64),
}

impl Default for FlagTest {
    fn default() -> Self {
        FlagTest::Equals(1.0)
    }
}

impl FlagTest {
    pub fn matches(self, value: f64) -> bool {
        match self {
            FlagTest::Equals(v) => value == v,
            FlagTest::Below(v) => value < v,
        }
    }
}

/// A reserved numeric code and the literal text that replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentinel {
    pub code: f64,
    pub literal: String,
}

impl ColumnRule {
    fn single(target: &str, source: &str, kind: RuleKind) -> Self {
        Self {
            target: target.to_string(),
            sources: vec![source.to_string()],
            kind,
        }
    }

    pub fn rename(target: &str, source: &str) -> Self {
        Self::single(target, source, RuleKind::Rename)
    }

    pub fn int(target: &str, source: &str) -> Self {
        Self::single(
            target,
            source,
            RuleKind::IntCast {
                text: false,
                references: None,
            },
        )
    }

    /// Integer code that must exist in lookup table `lookup`.
    pub fn code(target: &str, source: &str, lookup: &str) -> Self {
        Self::single(
            target,
            source,
            RuleKind::IntCast {
                text: false,
                references: Some(lookup.to_string()),
            },
        )
    }

    pub fn flag(target: &str, source: &str) -> Self {
        Self::single(
            target,
            source,
            RuleKind::BoolFlag {
                truth: FlagTest::default(),
            },
        )
    }

    pub fn flag_below(target: &str, source: &str, threshold: f64) -> Self {
        Self::single(
            target,
            source,
            RuleKind::BoolFlag {
                truth: FlagTest::Below(threshold),
            },
        )
    }

    /// Sentinel remap whose fall-through renders as a quoted integer.
    pub fn sentinel_text(target: &str, source: &str, sentinels: &[(f64, &str)]) -> Self {
        Self::single(
            target,
            source,
            RuleKind::SentinelRemap {
                sentinels: sentinels
                    .iter()
                    .map(|(code, literal)| Sentinel {
                        code: *code,
                        literal: literal.to_string(),
                    })
                    .collect(),
                text: true,
            },
        )
    }

    pub fn pivot(target: &str, group: &str, sources: &[&str], lookup: Option<&str>) -> Self {
        Self {
            target: target.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            kind: RuleKind::PivotIndicator {
                group: group.to_string(),
                references: lookup.map(str::to_string),
            },
        }
    }

    pub fn is_pivot(&self) -> bool {
        matches!(self.kind, RuleKind::PivotIndicator { .. })
    }

    /// Lookup table this rule's codes point into, if any.
    pub fn references(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::IntCast { references, .. } | RuleKind::PivotIndicator { references, .. } => {
                references.as_deref()
            }
            _ => None,
        }
    }
}

/// Mapping from dataset rows to one target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    pub table: String,
    #[serde(default)]
    pub role: TableRole,
    /// Source column identifying a row in error messages (e.g. `PUBID`).
    pub row_id: String,
    pub rules: Vec<ColumnRule>,
    /// Skip the row for this table when every listed column is null.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_when_all_null: Vec<String>,
    /// Tables referenced other than through rule `references` (e.g. the primary entity table).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl TableMapping {
    pub fn new(table: &str, role: TableRole, row_id: &str, rules: Vec<ColumnRule>) -> Self {
        Self {
            table: table.to_string(),
            role,
            row_id: row_id.to_string(),
            rules,
            skip_when_all_null: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn skip_when_all_null(mut self, columns: &[&str]) -> Self {
        self.skip_when_all_null = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn depends_on(mut self, tables: &[&str]) -> Self {
        self.depends_on = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Target column names in declared order.
    pub fn columns(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.target.clone()).collect()
    }

    /// Every source column the mapping reads, in first-use order.
    pub fn required_sources(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let all = std::iter::once(self.row_id.as_str())
            .chain(self.rules.iter().flat_map(|r| r.sources.iter().map(String::as_str)))
            .chain(self.skip_when_all_null.iter().map(String::as_str));
        for source in all {
            if !out.contains(&source) {
                out.push(source);
            }
        }
        out
    }

    /// All tables this mapping must load after.
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let all = self
            .rules
            .iter()
            .filter_map(ColumnRule::references)
            .chain(self.depends_on.iter().map(String::as_str));
        for table in all {
            if !out.contains(&table) {
                out.push(table);
            }
        }
        out
    }
}

/// Declaration of a lookup (dimension) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSpec {
    pub table: String,
    pub source: LookupSource,
}

impl LookupSpec {
    pub fn new(table: &str, source: LookupSource) -> Self {
        Self {
            table: table.to_string(),
            source,
        }
    }

    /// Target columns of the lookup block.
    pub fn columns(&self) -> Vec<String> {
        let cols: Vec<&str> = match &self.source {
            LookupSource::CodebookLabels { .. } => vec!["id", "label"],
            LookupSource::CodebookRanges { .. } => vec!["id", "lower_bound", "upper_bound"],
            LookupSource::Materials { name_column, .. } => {
                vec!["id", name_column.as_str(), "average_cost", "unit"]
            }
            LookupSource::FuelSources => vec!["id", "fuel_source", "average_carbon_output", "unit"],
        };
        cols.into_iter().map(str::to_string).collect()
    }
}

/// Where a lookup table's rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupSource {
    /// `code=label` value string of the codebook variable with this order index.
    CodebookLabels { order: u32 },
    /// Range-category value string of the codebook variable with this order index.
    CodebookRanges { order: u32 },
    /// Supplementary section of `id → {name, unit, cost}` objects.
    Materials { section: String, name_column: String },
    /// Supplementary `EnergySources.FuelSource` objects; ids are 1-based document positions.
    FuelSources,
}
