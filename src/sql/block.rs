//! Per-table rebuild blocks: one clear statement plus one multi-row insert.

use serde::{Deserialize, Serialize};

use crate::error::{RebuildError, RebuildResult};

use super::literal::TargetTuple;

/// How a table is emptied before reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearMode {
    /// `TRUNCATE TABLE t CASCADE;`
    #[default]
    TruncateCascade,
    /// `DELETE FROM t;`
    Delete,
}

impl ClearMode {
    pub fn statement(self, table: &str) -> String {
        match self {
            ClearMode::TruncateCascade => format!("TRUNCATE TABLE {table} CASCADE;"),
            ClearMode::Delete => format!("DELETE FROM {table};"),
        }
    }
}

/// The full-replace block for one target table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRebuildBlock {
    table: String,
    columns: Vec<String>,
    clear_statement: String,
    tuples: Vec<TargetTuple>,
}

impl TableRebuildBlock {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn clear_statement(&self) -> &str {
        &self.clear_statement
    }

    pub fn tuples(&self) -> &[TargetTuple] {
        &self.tuples
    }

    /// The multi-row insert, or `None` when there is nothing to insert.
    pub fn insert_statement(&self) -> Option<String> {
        if self.tuples.is_empty() {
            return None;
        }
        let rows: Vec<String> = self.tuples.iter().map(TargetTuple::render).collect();
        Some(format!(
            "INSERT INTO {} ({})\nVALUES\n{};",
            self.table,
            self.columns.join(", "),
            rows.join(",\n")
        ))
    }

    /// Render the block, terminated by a blank line.
    pub fn render(&self) -> String {
        let mut out = format!("-- Insert into {}\n{}\n", self.table, self.clear_statement);
        if let Some(insert) = self.insert_statement() {
            out.push_str(&insert);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Build the block for `table`.
///
/// Every tuple must have one literal per column.
pub fn build_block(
    table: &str,
    columns: Vec<String>,
    tuples: Vec<TargetTuple>,
    clear_mode: ClearMode,
) -> RebuildResult<TableRebuildBlock> {
    if columns.is_empty() {
        return Err(RebuildError::InvalidMapping {
            table: table.to_string(),
            message: "block has no columns".to_string(),
        });
    }
    if let Some((idx, t)) = tuples
        .iter()
        .enumerate()
        .find(|(_, t)| t.len() != columns.len())
    {
        return Err(RebuildError::InvalidMapping {
            table: table.to_string(),
            message: format!(
                "tuple {idx} has {} values for {} columns",
                t.len(),
                columns.len()
            ),
        });
    }

    Ok(TableRebuildBlock {
        table: table.to_string(),
        clear_statement: clear_mode.statement(table),
        columns,
        tuples,
    })
}
