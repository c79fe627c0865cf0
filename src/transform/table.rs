use tracing::debug;

use crate::error::{RebuildError, RebuildResult, RowFault};
use crate::mapping::TableMapping;
use crate::types::DataSet;

use super::lookups::Lookups;
use super::row::{RowFailure, RowOutcome, RowTransformer};
use super::{FaultMode, TableOutput, TransformOptions, TransformStats};

/// Drive every row of `dataset` through `mapping`.
///
/// Every source column the mapping reads must exist in the dataset schema; this is checked before
/// any row is processed. Tuples keep source row order, and pivot tuples of one row stay in
/// indicator declaration order.
pub fn transform_table(
    dataset: &DataSet,
    mapping: &TableMapping,
    lookups: &Lookups,
    options: TransformOptions,
) -> RebuildResult<TableOutput> {
    if let Some(column) = mapping
        .required_sources()
        .into_iter()
        .find(|c| dataset.schema.index_of(c).is_none())
    {
        return Err(RebuildError::MissingColumn {
            table: mapping.table.clone(),
            row_id: None,
            column: column.to_string(),
        });
    }

    let transformer =
        RowTransformer::new(mapping, lookups).check_references(options.check_references);
    let mut stats = TransformStats::default();
    let mut tuples = Vec::new();
    let mut faults: Vec<RowFault> = Vec::new();

    for row in dataset.source_rows() {
        stats.rows_seen += 1;
        match transformer.transform(&row) {
            Ok(RowOutcome::Skipped) => stats.rows_skipped += 1,
            Ok(RowOutcome::Emitted(mut emitted)) => {
                if !emitted.is_empty() {
                    stats.rows_emitted += 1;
                }
                stats.tuples += emitted.len();
                tuples.append(&mut emitted);
            }
            Err(RowFailure::Input(err)) => return Err(err),
            Err(RowFailure::Faults(mut row_faults)) => {
                stats.rows_faulted += 1;
                match options.fault_mode {
                    FaultMode::FailFast => {
                        if let Some(first) = row_faults.into_iter().next() {
                            return Err(first.into_error(&mapping.table));
                        }
                    }
                    FaultMode::Collect => faults.append(&mut row_faults),
                }
            }
        }
    }

    if !faults.is_empty() {
        return Err(RebuildError::RowFaults {
            table: mapping.table.clone(),
            faults,
        });
    }

    debug!(
        table = %mapping.table,
        rows = stats.rows_seen,
        skipped = stats.rows_skipped,
        tuples = stats.tuples,
        "transformed table"
    );

    Ok(TableOutput {
        table: mapping.table.clone(),
        columns: mapping.columns(),
        tuples,
        stats,
    })
}
