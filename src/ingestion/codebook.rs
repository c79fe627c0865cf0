//! Codebook sheet loading.
//!
//! Codebook exports usually carry a title row (or several) above the real header, and header
//! cells may contain line breaks (`"Variable\norder"`). The loader scans for the first row whose
//! whitespace-normalized cells include [`ORDER_HEADER`], [`NAME_HEADER`] and [`VALUES_HEADER`],
//! and reads variables from the rows below it.

use std::io::Read;
use std::path::Path;

use crate::codebook::{Codebook, CodebookVariable};
use crate::error::{RebuildError, RebuildResult};

pub const ORDER_HEADER: &str = "Variable order";
pub const NAME_HEADER: &str = "Variable name";
pub const VALUES_HEADER: &str = "Values/Format codes";

/// Load a codebook exported as CSV.
pub fn load_codebook_csv(path: impl AsRef<Path>) -> RebuildResult<Codebook> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    read_records(&mut rdr)
}

/// Load a CSV codebook from any reader.
pub fn load_codebook_from_reader<R: Read>(reader: R) -> RebuildResult<Codebook> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    read_records(&mut rdr)
}

fn read_records<R: Read>(rdr: &mut csv::Reader<R>) -> RebuildResult<Codebook> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    codebook_from_rows(rows)
}

/// Header row position and the column indexes of the three codebook fields.
struct HeaderLayout {
    row: usize,
    order: usize,
    name: usize,
    values: usize,
}

fn normalize_header(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_header(rows: &[Vec<String>]) -> RebuildResult<HeaderLayout> {
    for (row, cells) in rows.iter().enumerate() {
        let normalized: Vec<String> = cells.iter().map(|c| normalize_header(c)).collect();
        let position = |wanted: &str| {
            normalized
                .iter()
                .position(|c| c.eq_ignore_ascii_case(wanted))
        };
        if let (Some(order), Some(name), Some(values)) = (
            position(ORDER_HEADER),
            position(NAME_HEADER),
            position(VALUES_HEADER),
        ) {
            return Ok(HeaderLayout {
                row,
                order,
                name,
                values,
            });
        }
    }
    Err(RebuildError::SchemaMismatch {
        message: format!(
            "codebook header row not found (expected '{ORDER_HEADER}', '{NAME_HEADER}' and '{VALUES_HEADER}')"
        ),
    })
}

/// Build a [`Codebook`] from raw sheet rows (CSV records or workbook rows as text).
///
/// Rows above the header are ignored, as are rows below it with an empty order cell.
pub(crate) fn codebook_from_rows(rows: Vec<Vec<String>>) -> RebuildResult<Codebook> {
    let layout = find_header(&rows)?;
    let cell = |cells: &[String], idx: usize| cells.get(idx).map(|c| c.trim().to_string()).unwrap_or_default();

    let mut variables: Vec<CodebookVariable> = Vec::new();
    for (idx0, cells) in rows.iter().enumerate().skip(layout.row + 1) {
        let raw_order = cell(cells, layout.order);
        if raw_order.is_empty() {
            continue;
        }
        let user_row = idx0 + 1;
        let order = parse_order(&raw_order).ok_or_else(|| RebuildError::ParseError {
            row: user_row,
            column: ORDER_HEADER.to_string(),
            raw: raw_order.clone(),
            message: "expected a non-negative integer".to_string(),
        })?;
        if variables.iter().any(|v| v.order == order) {
            return Err(RebuildError::SchemaMismatch {
                message: format!("codebook row {user_row}: duplicate variable order {order}"),
            });
        }
        let values = cells.get(layout.values).cloned().unwrap_or_default();
        variables.push(CodebookVariable::new(order, cell(cells, layout.name), values));
    }

    Ok(Codebook::new(variables))
}

/// Accepts `"12"` and the `"12.0"` form workbook exports produce.
fn parse_order(raw: &str) -> Option<u32> {
    if let Ok(order) = raw.parse::<u32>() {
        return Some(order);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f >= 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}
