//! Row transformation: applying a [`crate::mapping::TableMapping`] to dataset rows.
//!
//! - [`RowTransformer`] turns one [`crate::types::SourceRow`] into zero, one or several
//!   [`crate::sql::TargetTuple`]s, or signals that the row is skipped for the table.
//! - [`transform_table`] drives a whole dataset through one mapping and reports
//!   [`TransformStats`], honoring the configured [`FaultMode`].
//!
//! Code columns that reference a lookup table are checked against [`Lookups`], the decoded
//! label/range maps and reference-data keys of the run.

mod lookups;
mod row;
mod table;

use serde::{Deserialize, Serialize};

use crate::sql::TargetTuple;

pub use lookups::{build_lookup, Lookup, LookupTable, Lookups};
pub use row::{RowFailure, RowOutcome, RowTransformer};
pub use table::transform_table;

/// What to do when a row holds bad data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    /// Abort on the first faulty row.
    #[default]
    FailFast,
    /// Finish the table, then abort with every fault found.
    Collect,
}

/// Options for [`transform_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub fault_mode: FaultMode,
    /// Verify that referenced codes exist in their lookup tables.
    pub check_references: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            fault_mode: FaultMode::FailFast,
            check_references: true,
        }
    }
}

/// Per-table counters.
///
/// Skipped rows are a control outcome and are counted apart from faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub rows_seen: usize,
    /// Rows that produced at least one tuple.
    pub rows_emitted: usize,
    pub rows_skipped: usize,
    pub rows_faulted: usize,
    pub tuples: usize,
}

/// Result of driving a dataset through one mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOutput {
    pub table: String,
    pub columns: Vec<String>,
    pub tuples: Vec<TargetTuple>,
    pub stats: TransformStats,
}
