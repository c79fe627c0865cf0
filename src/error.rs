use std::fmt;

use thiserror::Error;

/// Convenience result type used across the crate.
pub type RebuildResult<T> = Result<T, RebuildError>;

/// Error type returned by loading, transformation and script assembly.
///
/// Every variant is fatal for the run: no script is produced once one is returned.
#[derive(Debug, Error)]
pub enum RebuildError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Workbook loading error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV loading error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error (supplementary document, configuration, mapping registry).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool for parallel table builds could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The input does not have the expected shape (missing columns, missing header row, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A raw cell could not be parsed while loading.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A codebook value/format line is not a valid `code=text` entry.
    #[error("malformed codebook entry for variable {variable}: {message} (line='{line}')")]
    MalformedCodebookEntry {
        variable: u32,
        line: String,
        message: String,
    },

    /// No mapping or lookup is registered under this name.
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },

    /// A mapping requires a source column the dataset does not have.
    #[error("table '{table}'{}: missing source column '{column}'", RowLabel(.row_id))]
    MissingColumn {
        table: String,
        row_id: Option<String>,
        column: String,
    },

    /// A value that must be an integer code has a fractional part.
    #[error("table '{table}'{}: column '{column}' holds non-integral value {value}", RowLabel(.row_id))]
    NonIntegralValue {
        table: String,
        row_id: Option<String>,
        column: String,
        value: f64,
    },

    /// A numeric rule was applied to a non-numeric cell.
    #[error("table '{table}'{}: column '{column}' holds non-numeric value '{raw}'", RowLabel(.row_id))]
    NonNumericValue {
        table: String,
        row_id: Option<String>,
        column: String,
        raw: String,
    },

    /// A code does not exist in the lookup table its column references.
    #[error("table '{table}'{}: column '{column}' code {code} not found in '{lookup}'", RowLabel(.row_id))]
    UnknownCode {
        table: String,
        row_id: Option<String>,
        column: String,
        code: i64,
        lookup: String,
    },

    /// Collected row faults for one table (see [`crate::transform::FaultMode::Collect`]).
    #[error("table '{table}': {} row fault(s); first: {}", .faults.len(), FirstFault(.faults))]
    RowFaults { table: String, faults: Vec<RowFault> },

    /// A table mapping or lookup declaration is inconsistent.
    #[error("invalid mapping for '{table}': {message}")]
    InvalidMapping { table: String, message: String },

    /// The dependency graph between the blocks of a run contains a cycle.
    #[error("dependency cycle between tables: {}", .tables.join(", "))]
    DependencyCycle { tables: Vec<String> },

    /// The supplementary document lacks a section or field a lookup table needs.
    #[error("missing reference data: {message}")]
    MissingReferenceData { message: String },
}

/// A single row-level data fault.
///
/// Faults are reported immediately in fail-fast mode and accumulated per table in collect mode.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFault {
    NonIntegral {
        row_id: Option<String>,
        column: String,
        value: f64,
    },
    NonNumeric {
        row_id: Option<String>,
        column: String,
        raw: String,
    },
    UnknownCode {
        row_id: Option<String>,
        column: String,
        code: i64,
        lookup: String,
    },
}

impl RowFault {
    /// Attach the table name and turn the fault into a run-level error.
    pub fn into_error(self, table: &str) -> RebuildError {
        let table = table.to_string();
        match self {
            RowFault::NonIntegral { row_id, column, value } => RebuildError::NonIntegralValue {
                table,
                row_id,
                column,
                value,
            },
            RowFault::NonNumeric { row_id, column, raw } => RebuildError::NonNumericValue {
                table,
                row_id,
                column,
                raw,
            },
            RowFault::UnknownCode {
                row_id,
                column,
                code,
                lookup,
            } => RebuildError::UnknownCode {
                table,
                row_id,
                column,
                code,
                lookup,
            },
        }
    }

    pub fn row_id(&self) -> Option<&str> {
        match self {
            RowFault::NonIntegral { row_id, .. }
            | RowFault::NonNumeric { row_id, .. }
            | RowFault::UnknownCode { row_id, .. } => row_id.as_deref(),
        }
    }
}

impl fmt::Display for RowFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFault::NonIntegral { row_id, column, value } => {
                write!(f, "{}column '{column}' non-integral value {value}", RowPrefix(row_id))
            }
            RowFault::NonNumeric { row_id, column, raw } => {
                write!(f, "{}column '{column}' non-numeric value '{raw}'", RowPrefix(row_id))
            }
            RowFault::UnknownCode {
                row_id,
                column,
                code,
                lookup,
            } => write!(
                f,
                "{}column '{column}' code {code} not found in '{lookup}'",
                RowPrefix(row_id)
            ),
        }
    }
}

struct RowLabel<'a>(&'a Option<String>);

impl fmt::Display for RowLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, " row {id}"),
            None => Ok(()),
        }
    }
}

struct RowPrefix<'a>(&'a Option<String>);

impl fmt::Display for RowPrefix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "row {id}: "),
            None => Ok(()),
        }
    }
}

struct FirstFault<'a>(&'a [RowFault]);

impl fmt::Display for FirstFault<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(fault) => write!(f, "{fault}"),
            None => f.write_str("none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RebuildError, RowFault};

    #[test]
    fn row_level_errors_name_table_row_and_column() {
        let err = RowFault::NonIntegral {
            row_id: Some("17".to_string()),
            column: "SQFT".to_string(),
            value: 12.5,
        }
        .into_error("buildings");
        let msg = err.to_string();
        assert!(msg.contains("table 'buildings' row 17"));
        assert!(msg.contains("column 'SQFT'"));
        assert!(msg.contains("12.5"));
    }

    #[test]
    fn missing_column_without_row_omits_row_label() {
        let err = RebuildError::MissingColumn {
            table: "schedules".to_string(),
            row_id: None,
            column: "WKHRS".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "table 'schedules': missing source column 'WKHRS'"
        );
    }

    #[test]
    fn collected_faults_report_count_and_first_fault() {
        let err = RebuildError::RowFaults {
            table: "buildings".to_string(),
            faults: vec![
                RowFault::NonNumeric {
                    row_id: Some("1".to_string()),
                    column: "REGION".to_string(),
                    raw: "north".to_string(),
                },
                RowFault::NonIntegral {
                    row_id: Some("2".to_string()),
                    column: "SQFT".to_string(),
                    value: 0.5,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 row fault(s)"));
        assert!(msg.contains("row 1: column 'REGION' non-numeric value 'north'"));
    }
}
