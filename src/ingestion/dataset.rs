//! CSV loading of the survey dataset.

use std::path::Path;

use crate::error::{RebuildError, RebuildResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// What the dataset loaders do with a schema field the file does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingColumns {
    /// Fail with [`RebuildError::SchemaMismatch`].
    #[default]
    Reject,
    /// Leave the field out of the loaded schema. Mappings that read it then fail with
    /// [`RebuildError::MissingColumn`], which names the table.
    Skip,
}

/// Load a dataset CSV into an in-memory [`DataSet`].
///
/// Rules:
///
/// - The CSV must have headers.
/// - Headers should contain all schema fields (order can differ; extra columns are ignored).
///   Absent fields are handled per `missing`.
/// - Empty cells (and `NA`/`NaN`) load as [`Value::Null`].
/// - A non-numeric or non-finite cell in a numeric field is kept as text, so the transformer can
///   report it with its table and row.
pub fn load_dataset_csv(
    path: impl AsRef<Path>,
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    load_dataset_from_reader(&mut rdr, schema, missing)
}

/// Load dataset rows from an existing CSV reader.
pub fn load_dataset_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<DataSet> {
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let (schema, col_idxs) = project_headers(&headers, schema, missing)?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based, and the header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_cell(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Match schema fields to header positions, returning the schema actually loaded.
pub(crate) fn project_headers(
    headers: &[String],
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<(Schema, Vec<usize>)> {
    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields.len());
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h.trim() == field.name) {
            Some(idx) => {
                fields.push(field.clone());
                col_idxs.push(idx);
            }
            None if missing == MissingColumns::Skip => {}
            None => {
                return Err(RebuildError::SchemaMismatch {
                    message: format!(
                        "dataset is missing required column '{}'. headers={headers:?}",
                        field.name
                    ),
                });
            }
        }
    }
    Ok((Schema::new(fields), col_idxs))
}

/// Numeric cell value; unparseable and non-finite text stays text.
pub(crate) fn parse_number_cell(trimmed: &str) -> Value {
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float64(v),
        _ => Value::Utf8(trimmed.to_owned()),
    }
}

pub(crate) fn is_missing_marker(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("nan")
}

fn parse_cell(row: usize, column: &str, data_type: &DataType, raw: &str) -> RebuildResult<Value> {
    let trimmed = raw.trim();
    if is_missing_marker(trimmed) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            RebuildError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => Ok(parse_number_cell(trimmed)),
    }
}
