use crate::error::{RebuildError, RowFault};
use crate::mapping::{ColumnRule, RuleKind, TableMapping};
use crate::sql::{SqlLiteral, TargetTuple};
use crate::types::{SourceRow, Value};

use super::lookups::Lookups;

/// Successful outcome for one (table, row) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Tuples for the table. Empty when a pivot group has no active indicator.
    Emitted(Vec<TargetTuple>),
    /// The table's all-null skip policy matched this row.
    Skipped,
}

/// Why a row could not be transformed.
#[derive(Debug)]
pub enum RowFailure {
    /// Bad data in this row (every faulty column of the row is listed).
    Faults(Vec<RowFault>),
    /// A structural problem that invalidates the whole run.
    Input(RebuildError),
}

/// Applies one table mapping to individual source rows.
#[derive(Debug, Clone, Copy)]
pub struct RowTransformer<'a> {
    mapping: &'a TableMapping,
    lookups: &'a Lookups,
    check_references: bool,
}

enum Cell {
    Literal(SqlLiteral),
    /// Placeholder for the pivot column, filled per active indicator.
    Pivot(Vec<i64>),
}

impl<'a> RowTransformer<'a> {
    pub fn new(mapping: &'a TableMapping, lookups: &'a Lookups) -> Self {
        Self {
            mapping,
            lookups,
            check_references: true,
        }
    }

    pub fn check_references(mut self, enabled: bool) -> Self {
        self.check_references = enabled;
        self
    }

    pub fn mapping(&self) -> &'a TableMapping {
        self.mapping
    }

    /// Transform one row.
    ///
    /// Rules run in declared column order. When the mapping has a pivot rule, the other columns'
    /// literals are replicated into one tuple per active indicator, in indicator declaration
    /// order.
    pub fn transform(&self, row: &SourceRow<'_>) -> Result<RowOutcome, RowFailure> {
        let row_id = self.row_id(row)?;

        if !self.mapping.skip_when_all_null.is_empty() {
            let mut all_null = true;
            for column in &self.mapping.skip_when_all_null {
                if !self.value(row, column, &row_id)?.is_missing() {
                    all_null = false;
                    break;
                }
            }
            if all_null {
                return Ok(RowOutcome::Skipped);
            }
        }

        let mut faults: Vec<RowFault> = Vec::new();
        let mut cells: Vec<Cell> = Vec::with_capacity(self.mapping.rules.len());
        for rule in &self.mapping.rules {
            match self.apply(rule, row, &row_id) {
                Ok(cell) => cells.push(cell),
                Err(RowFailure::Faults(mut f)) => faults.append(&mut f),
                Err(input) => return Err(input),
            }
        }
        if !faults.is_empty() {
            return Err(RowFailure::Faults(faults));
        }

        let indices = cells.iter().find_map(|c| match c {
            Cell::Pivot(indices) => Some(indices.clone()),
            Cell::Literal(_) => None,
        });

        let tuples = match indices {
            None => vec![TargetTuple::new(
                cells
                    .into_iter()
                    .map(|c| match c {
                        Cell::Literal(lit) => lit,
                        Cell::Pivot(_) => SqlLiteral::Null,
                    })
                    .collect(),
            )],
            Some(indices) => indices
                .into_iter()
                .map(|idx| {
                    TargetTuple::new(
                        cells
                            .iter()
                            .map(|c| match c {
                                Cell::Literal(lit) => lit.clone(),
                                Cell::Pivot(_) => SqlLiteral::Integer(idx),
                            })
                            .collect(),
                    )
                })
                .collect(),
        };

        Ok(RowOutcome::Emitted(tuples))
    }

    fn apply(&self, rule: &ColumnRule, row: &SourceRow<'_>, row_id: &Option<String>) -> Result<Cell, RowFailure> {
        match &rule.kind {
            RuleKind::PivotIndicator { references, .. } => {
                self.pivot(rule, references.as_deref(), row, row_id)
            }
            RuleKind::Rename => self.scalar(rule, row, row_id, |value, _| Ok(SqlLiteral::Real(value))),
            RuleKind::BoolFlag { truth } => {
                self.scalar(rule, row, row_id, |value, _| Ok(SqlLiteral::flag(truth.matches(value))))
            }
            RuleKind::IntCast { text, references } => self.scalar(rule, row, row_id, |value, source| {
                let code = integral(value, source, row_id)?;
                if let Some(lookup) = references {
                    if let Some(fault) = self.check_code(lookup, code, source, row_id)? {
                        return Err(RowFailure::Faults(vec![fault]));
                    }
                }
                Ok(int_literal(code, *text))
            }),
            RuleKind::SentinelRemap { sentinels, text } => self.scalar(rule, row, row_id, |value, source| {
                match sentinels.iter().find(|s| s.code == value) {
                    Some(s) => Ok(SqlLiteral::Text(s.literal.clone())),
                    None => Ok(int_literal(integral(value, source, row_id)?, *text)),
                }
            }),
        }
    }

    /// Single-source rule: missing values render `NULL`, present ones go through `convert`.
    fn scalar<F>(&self, rule: &ColumnRule, row: &SourceRow<'_>, row_id: &Option<String>, convert: F) -> Result<Cell, RowFailure>
    where
        F: FnOnce(f64, &str) -> Result<SqlLiteral, RowFailure>,
    {
        let source = rule.sources.first().map(String::as_str).unwrap_or_default();
        match self.number(row, source, row_id)? {
            Ok(None) => Ok(Cell::Literal(SqlLiteral::Null)),
            Ok(Some(value)) => convert(value, source).map(Cell::Literal),
            Err(fault) => Err(RowFailure::Faults(vec![fault])),
        }
    }

    fn pivot(
        &self,
        rule: &ColumnRule,
        references: Option<&str>,
        row: &SourceRow<'_>,
        row_id: &Option<String>,
    ) -> Result<Cell, RowFailure> {
        let mut active = Vec::new();
        let mut faults = Vec::new();
        for (pos, source) in rule.sources.iter().enumerate() {
            match self.number(row, source, row_id)? {
                Ok(Some(v)) if v == 1.0 => active.push(pos as i64 + 1),
                Ok(_) => {}
                Err(fault) => faults.push(fault),
            }
        }
        if let Some(lookup) = references {
            for &idx in &active {
                if let Some(fault) = self.check_code(lookup, idx, &rule.target, row_id)? {
                    faults.push(fault);
                }
            }
        }
        if !faults.is_empty() {
            return Err(RowFailure::Faults(faults));
        }
        Ok(Cell::Pivot(active))
    }

    fn value<'r>(&self, row: &SourceRow<'r>, column: &str, row_id: &Option<String>) -> Result<&'r Value, RowFailure> {
        row.get(column).ok_or_else(|| {
            RowFailure::Input(RebuildError::MissingColumn {
                table: self.mapping.table.clone(),
                row_id: row_id.clone(),
                column: column.to_string(),
            })
        })
    }

    /// Outer error: structural. Inner error: data fault.
    fn number(
        &self,
        row: &SourceRow<'_>,
        column: &str,
        row_id: &Option<String>,
    ) -> Result<Result<Option<f64>, RowFault>, RowFailure> {
        let value = self.value(row, column, row_id)?;
        Ok(value.as_number().map_err(|raw| RowFault::NonNumeric {
            row_id: row_id.clone(),
            column: column.to_string(),
            raw,
        }))
    }

    fn check_code(
        &self,
        lookup: &str,
        code: i64,
        column: &str,
        row_id: &Option<String>,
    ) -> Result<Option<RowFault>, RowFailure> {
        if !self.check_references {
            return Ok(None);
        }
        match self.lookups.contains_code(lookup, code) {
            Some(true) => Ok(None),
            Some(false) => Ok(Some(RowFault::UnknownCode {
                row_id: row_id.clone(),
                column: column.to_string(),
                code,
                lookup: lookup.to_string(),
            })),
            None => Err(RowFailure::Input(RebuildError::UnknownTable {
                table: lookup.to_string(),
            })),
        }
    }

    fn row_id(&self, row: &SourceRow<'_>) -> Result<Option<String>, RowFailure> {
        let value = self.value(row, &self.mapping.row_id, &None)?;
        Ok(match value {
            Value::Null => None,
            Value::Int64(i) => Some(i.to_string()),
            Value::Float64(f) if f.is_nan() => None,
            Value::Float64(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            Value::Float64(f) => Some(f.to_string()),
            Value::Utf8(s) => Some(s.clone()),
        })
    }
}

fn integral(value: f64, column: &str, row_id: &Option<String>) -> Result<i64, RowFailure> {
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    if value.fract() != 0.0 || value.abs() > LIMIT {
        return Err(RowFailure::Faults(vec![RowFault::NonIntegral {
            row_id: row_id.clone(),
            column: column.to_string(),
            value,
        }]));
    }
    Ok(value as i64)
}

fn int_literal(code: i64, text: bool) -> SqlLiteral {
    if text {
        SqlLiteral::Text(code.to_string())
    } else {
        SqlLiteral::Integer(code)
    }
}

#[cfg(test)]
mod tests {
    use super::{RowFailure, RowOutcome, RowTransformer};
    use crate::codebook::decode_labels;
    use crate::error::{RebuildError, RowFault};
    use crate::mapping::{ColumnRule, TableMapping};
    use crate::sql::{SqlLiteral, TableRole, TargetTuple};
    use crate::transform::{Lookup, Lookups};
    use crate::types::{DataSet, Schema, Value};

    fn one_row(columns: &[&str], values: Vec<Value>) -> DataSet {
        DataSet::new(Schema::numeric(columns.iter().copied()), vec![values])
    }

    fn emitted(outcome: RowOutcome) -> Vec<TargetTuple> {
        match outcome {
            RowOutcome::Emitted(t) => t,
            RowOutcome::Skipped => panic!("row was skipped"),
        }
    }

    fn faults(failure: RowFailure) -> Vec<RowFault> {
        match failure {
            RowFailure::Faults(f) => f,
            RowFailure::Input(e) => panic!("unexpected input error: {e}"),
        }
    }

    fn accessibility() -> TableMapping {
        TableMapping::new(
            "accessibility_modes",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::sentinel_text("number_of_floors", "NFLOOR", &[(994.0, "10-14"), (995.0, "15+")]),
            ],
        )
    }

    fn floors(value: Value) -> SqlLiteral {
        let ds = one_row(&["PUBID", "NFLOOR"], vec![Value::Float64(1.0), value]);
        let lookups = Lookups::new();
        let mapping = accessibility();
        let t = RowTransformer::new(&mapping, &lookups);
        let tuples = emitted(t.transform(&ds.row(0).unwrap()).unwrap());
        tuples[0].values()[1].clone()
    }

    #[test]
    fn sentinel_codes_remap_before_integer_rule() {
        assert_eq!(floors(Value::Float64(994.0)), SqlLiteral::text("10-14"));
        assert_eq!(floors(Value::Float64(995.0)), SqlLiteral::text("15+"));
        assert_eq!(floors(Value::Float64(3.0)), SqlLiteral::text("3"));
        assert_eq!(floors(Value::Float64(3.0)).render(), "'3'");
        assert_eq!(floors(Value::Null), SqlLiteral::Null);
    }

    #[test]
    fn sentinel_fall_through_rejects_fractions() {
        let ds = one_row(&["PUBID", "NFLOOR"], vec![Value::Float64(8.0), Value::Float64(2.5)]);
        let lookups = Lookups::new();
        let mapping = accessibility();
        let err = RowTransformer::new(&mapping, &lookups)
            .transform(&ds.row(0).unwrap())
            .unwrap_err();
        assert_eq!(
            faults(err),
            vec![RowFault::NonIntegral {
                row_id: Some("8".to_string()),
                column: "NFLOOR".to_string(),
                value: 2.5,
            }]
        );
    }

    #[test]
    fn bool_flags_are_ternary_text() {
        let mapping = TableMapping::new(
            "renovations_since_2000",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::flag("roof_replace", "RENRFF"),
                ColumnRule::flag("window_replace", "RENWIN"),
                ColumnRule::flag("other_renovations", "RENOTH"),
            ],
        );
        let ds = one_row(
            &["PUBID", "RENRFF", "RENWIN", "RENOTH"],
            vec![Value::Float64(5.0), Value::Float64(1.0), Value::Float64(0.0), Value::Null],
        );
        let lookups = Lookups::new();
        let tuples = emitted(
            RowTransformer::new(&mapping, &lookups)
                .transform(&ds.row(0).unwrap())
                .unwrap(),
        );
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].render(), "(5, 'True', 'False', NULL)");
    }

    #[test]
    fn flag_below_threshold() {
        let mapping = TableMapping::new(
            "schedules",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::flag_below("open_during_week", "OPNMF", 3.0),
            ],
        );
        let lookups = Lookups::new();
        let t = RowTransformer::new(&mapping, &lookups);
        for (code, expected) in [(1.0, "'True'"), (2.0, "'True'"), (3.0, "'False'")] {
            let ds = one_row(&["PUBID", "OPNMF"], vec![Value::Float64(1.0), Value::Float64(code)]);
            let tuples = emitted(t.transform(&ds.row(0).unwrap()).unwrap());
            assert_eq!(tuples[0].values()[1].render(), expected);
        }
    }

    #[test]
    fn rename_keeps_real_encoding() {
        let mapping = TableMapping::new(
            "lighting_information",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::rename("percent_led", "LEDP"),
            ],
        );
        let ds = one_row(&["PUBID", "LEDP"], vec![Value::Float64(2.0), Value::Float64(40.0)]);
        let lookups = Lookups::new();
        let tuples = emitted(
            RowTransformer::new(&mapping, &lookups)
                .transform(&ds.row(0).unwrap())
                .unwrap(),
        );
        assert_eq!(tuples[0].render(), "(2, 40.0)");
    }

    fn energy_sources_used() -> TableMapping {
        let indicators = [
            "ELUSED", "NGUSED", "FKUSED", "PRUSED", "STUSED", "HWUSED", "CWUSED", "WOUSED", "COUSED",
            "SOUSED", "OTUSED",
        ];
        TableMapping::new(
            "energy_sources_used",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::pivot("energy_source", "energy_source_indicators", &indicators, Some("energy_sources")),
            ],
        )
    }

    fn energy_lookups() -> Lookups {
        let mut lookups = Lookups::new();
        lookups.insert("energy_sources", Lookup::Keys((1..=11).collect()));
        lookups
    }

    fn indicator_row(values: [Value; 11]) -> DataSet {
        let mut columns = vec!["PUBID"];
        columns.extend([
            "ELUSED", "NGUSED", "FKUSED", "PRUSED", "STUSED", "HWUSED", "CWUSED", "WOUSED", "COUSED",
            "SOUSED", "OTUSED",
        ]);
        let mut row = vec![Value::Float64(42.0)];
        row.extend(values);
        one_row(&columns, row)
    }

    #[test]
    fn pivot_emits_one_tuple_per_active_indicator_in_declaration_order() {
        let mut values: [Value; 11] = std::array::from_fn(|_| Value::Null);
        values[0] = Value::Float64(1.0);
        values[1] = Value::Float64(0.0);
        values[3] = Value::Float64(1.0);
        values[4] = Value::Float64(2.0);
        let ds = indicator_row(values);

        let mapping = energy_sources_used();
        let lookups = energy_lookups();
        let tuples = emitted(
            RowTransformer::new(&mapping, &lookups)
                .transform(&ds.row(0).unwrap())
                .unwrap(),
        );
        assert_eq!(
            tuples,
            vec![
                TargetTuple::new(vec![SqlLiteral::Integer(42), SqlLiteral::Integer(1)]),
                TargetTuple::new(vec![SqlLiteral::Integer(42), SqlLiteral::Integer(4)]),
            ]
        );
    }

    #[test]
    fn pivot_without_active_indicator_emits_nothing() {
        let ds = indicator_row(std::array::from_fn(|_| Value::Float64(0.0)));
        let mapping = energy_sources_used();
        let lookups = energy_lookups();
        let tuples = emitted(
            RowTransformer::new(&mapping, &lookups)
                .transform(&ds.row(0).unwrap())
                .unwrap(),
        );
        assert!(tuples.is_empty());
    }

    #[test]
    fn pivot_index_must_exist_in_referenced_lookup() {
        let mut values: [Value; 11] = std::array::from_fn(|_| Value::Null);
        values[10] = Value::Float64(1.0);
        let ds = indicator_row(values);
        let mapping = energy_sources_used();
        let mut lookups = Lookups::new();
        lookups.insert("energy_sources", Lookup::Keys((1..=10).collect()));

        let t = RowTransformer::new(&mapping, &lookups);
        let f = faults(t.transform(&ds.row(0).unwrap()).unwrap_err());
        assert!(matches!(&f[0], RowFault::UnknownCode { code: 11, .. }));

        let tuples = emitted(t.check_references(false).transform(&ds.row(0).unwrap()).unwrap());
        assert_eq!(tuples.len(), 1);
    }

    #[test]
    fn all_null_skip_policy_skips_row() {
        let mapping = TableMapping::new(
            "serves_food",
            TableRole::Dependent,
            "PUBID",
            vec![
                ColumnRule::int("building_id", "PUBID"),
                ColumnRule::int("food_service_seating", "FDSEAT"),
                ColumnRule::flag("drive_thru_window", "DRVTHRU"),
            ],
        )
        .skip_when_all_null(&["FDSEAT", "DRVTHRU"]);
        let lookups = Lookups::new();
        let t = RowTransformer::new(&mapping, &lookups);

        let ds = one_row(&["PUBID", "FDSEAT", "DRVTHRU"], vec![Value::Float64(1.0), Value::Null, Value::Null]);
        assert_eq!(t.transform(&ds.row(0).unwrap()).unwrap(), RowOutcome::Skipped);

        let ds = one_row(
            &["PUBID", "FDSEAT", "DRVTHRU"],
            vec![Value::Float64(1.0), Value::Null, Value::Float64(2.0)],
        );
        let tuples = emitted(t.transform(&ds.row(0).unwrap()).unwrap());
        assert_eq!(tuples[0].render(), "(1, NULL, 'False')");
    }

    #[test]
    fn code_columns_are_checked_against_label_maps() {
        let mapping = TableMapping::new(
            "buildings",
            TableRole::Primary,
            "PUBID",
            vec![
                ColumnRule::int("id", "PUBID"),
                ColumnRule::code("census_region", "REGION", "census_regions"),
            ],
        );
        let mut lookups = Lookups::new();
        lookups.insert(
            "census_regions",
            Lookup::Labels(decode_labels(2, "1=Northeast\n2=Midwest").unwrap()),
        );
        let t = RowTransformer::new(&mapping, &lookups);

        let ok = one_row(&["PUBID", "REGION"], vec![Value::Float64(1.0), Value::Float64(2.0)]);
        assert_eq!(emitted(t.transform(&ok.row(0).unwrap()).unwrap())[0].render(), "(1, 2)");

        let bad = one_row(&["PUBID", "REGION"], vec![Value::Float64(1.0), Value::Float64(9.0)]);
        let f = faults(t.transform(&bad.row(0).unwrap()).unwrap_err());
        assert_eq!(
            f,
            vec![RowFault::UnknownCode {
                row_id: Some("1".to_string()),
                column: "REGION".to_string(),
                code: 9,
                lookup: "census_regions".to_string(),
            }]
        );
    }

    #[test]
    fn every_faulty_column_of_a_row_is_reported() {
        let mapping = TableMapping::new(
            "buildings",
            TableRole::Primary,
            "PUBID",
            vec![
                ColumnRule::int("id", "PUBID"),
                ColumnRule::int("square_footage", "SQFT"),
                ColumnRule::int("census_region", "REGION"),
            ],
        );
        let ds = DataSet::new(
            Schema::numeric(["PUBID", "SQFT", "REGION"]),
            vec![vec![
                Value::Float64(3.0),
                Value::Float64(1200.5),
                Value::Utf8("north".to_string()),
            ]],
        );
        let lookups = Lookups::new();
        let f = faults(
            RowTransformer::new(&mapping, &lookups)
                .transform(&ds.row(0).unwrap())
                .unwrap_err(),
        );
        assert_eq!(f.len(), 2);
        assert!(matches!(&f[0], RowFault::NonIntegral { column, .. } if column == "SQFT"));
        assert!(matches!(&f[1], RowFault::NonNumeric { raw, .. } if raw == "north"));
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let mapping = accessibility();
        let ds = one_row(&["PUBID"], vec![Value::Float64(4.0)]);
        let lookups = Lookups::new();
        match RowTransformer::new(&mapping, &lookups).transform(&ds.row(0).unwrap()) {
            Err(RowFailure::Input(RebuildError::MissingColumn { column, row_id, .. })) => {
                assert_eq!(column, "NFLOOR");
                assert_eq!(row_id.as_deref(), Some("4"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
