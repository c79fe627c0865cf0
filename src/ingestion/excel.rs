#![cfg(feature = "excel")]

//! Workbook loading (`.xlsx`, `.xls`, `.ods`, ...) for the dataset and the codebook.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::codebook::Codebook;
use crate::error::{RebuildError, RebuildResult};
use crate::types::{DataSet, DataType, Schema, Value};

use super::codebook::codebook_from_rows;
use super::dataset::{MissingColumns, is_missing_marker, parse_number_cell, project_headers};

/// Load the dataset from a workbook sheet.
///
/// Behavior:
/// - Picks `sheet_name` if provided; otherwise uses the first sheet in the workbook
/// - Detects the first non-empty row as the header row
/// - Matches schema fields to headers; absent fields are handled per `missing`
/// - Reads remaining rows; non-numeric and non-finite cells in numeric fields are kept as text
pub fn load_dataset_excel(
    path: impl AsRef<Path>,
    sheet_name: Option<&str>,
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<DataSet> {
    let range = sheet_range(path, sheet_name)?;
    let (header_row_idx, schema, col_idxs) = build_header_projection(&range, schema, missing)?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row) in range.rows().enumerate().skip(header_row_idx + 1) {
        let user_row = idx0 + 1;
        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            out_row.push(convert_cell(user_row, &field.name, &field.data_type, cell)?);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Load the codebook from a workbook sheet (first sheet when `sheet_name` is `None`).
pub fn load_codebook_excel(path: impl AsRef<Path>, sheet_name: Option<&str>) -> RebuildResult<Codebook> {
    let range = sheet_range(path, sheet_name)?;
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    codebook_from_rows(rows).map_err(|e| match e {
        RebuildError::SchemaMismatch { message } => RebuildError::SchemaMismatch {
            message: format!("sheet '{}': {message}", sheet_name.unwrap_or("<first>")),
        },
        other => other,
    })
}

fn sheet_range(path: impl AsRef<Path>, sheet_name: Option<&str>) -> RebuildResult<calamine::Range<Data>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| RebuildError::SchemaMismatch {
                message: "workbook has no sheets".to_string(),
            })?,
    };
    Ok(workbook.worksheet_range(&sheet)?)
}

fn build_header_projection(
    range: &calamine::Range<Data>,
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<(usize, Schema, Vec<usize>)> {
    let (header_row_idx, header_cells) = range
        .rows()
        .enumerate()
        .find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx0, row)| (idx0, row.iter().map(cell_to_string).collect::<Vec<_>>()))
        .ok_or_else(|| RebuildError::SchemaMismatch {
            message: "sheet has no non-empty rows (no header row found)".to_string(),
        })?;

    let (schema, col_idxs) = project_headers(&header_cells, schema, missing)?;
    Ok((header_row_idx, schema, col_idxs))
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn convert_cell(row: usize, column: &str, data_type: &DataType, c: &Data) -> RebuildResult<Value> {
    if matches!(c, Data::Empty) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(cell_to_string(c))),
        DataType::Int64 => parse_i64_cell(row, column, c).map(Value::Int64),
        DataType::Float64 => Ok(match c {
            Data::Float(f) => Value::Float64(*f),
            Data::Int(i) => Value::Float64(*i as f64),
            Data::String(s) => {
                let trimmed = s.trim();
                if is_missing_marker(trimmed) {
                    Value::Null
                } else {
                    parse_number_cell(trimmed)
                }
            }
            other => Value::Utf8(cell_to_string(other)),
        }),
    }
}

fn parse_i64_cell(row: usize, column: &str, c: &Data) -> RebuildResult<i64> {
    match c {
        Data::Int(i) => Ok(*i),
        Data::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Data::String(s) => s.trim().parse::<i64>().map_err(|e| RebuildError::ParseError {
            row,
            column: column.to_string(),
            raw: s.clone(),
            message: e.to_string(),
        }),
        _ => Err(RebuildError::ParseError {
            row,
            column: column.to_string(),
            raw: cell_to_string(c),
            message: "expected integer".to_string(),
        }),
    }
}
