//! Unified loading entrypoints.
//!
//! - If [`LoadOptions::format`] is `None`, the format is inferred from the file extension.
//! - If a [`crate::observer::RebuildObserver`] is provided, success/failure/alerts are reported
//!   to it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::codebook::Codebook;
use crate::error::{RebuildError, RebuildResult};
use crate::observer::{
    FailureContext, LoadContext, LoadStats, RebuildObserver, RebuildSeverity, RunStage, SourceKind,
    report_failure,
};
use crate::types::{DataSet, Schema};

use super::dataset::MissingColumns;
use super::supplementary::SupplementaryData;
use super::{codebook, dataset};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// A single JSON document.
    Json,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
}

impl SourceFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Infer the format of `path` from its extension.
    pub fn from_path(path: &Path) -> RebuildResult<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| RebuildError::SchemaMismatch {
                message: format!(
                    "cannot infer format: path has no extension ({})",
                    path.display()
                ),
            })?;

        Self::from_extension(ext).ok_or_else(|| RebuildError::SchemaMismatch {
            message: format!(
                "cannot infer format from extension '{ext}' for path ({})",
                path.display()
            ),
        })
    }
}

/// Options controlling unified loading behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<SourceFormat>,
    /// Workbook sheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
    /// How dataset loading treats schema fields the file lacks.
    pub missing_columns: MissingColumns,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn RebuildObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: RebuildSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("format", &self.format)
            .field("sheet", &self.sheet)
            .field("missing_columns", &self.missing_columns)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: None,
            sheet: None,
            missing_columns: MissingColumns::Reject,
            observer: None,
            alert_at_or_above: RebuildSeverity::Critical,
        }
    }
}

/// Load the survey dataset, projected onto `schema`.
///
/// ```no_run
/// use codebook_sql::ingestion::{load_dataset, LoadOptions};
/// use codebook_sql::mapping::MappingRegistry;
///
/// # fn main() -> Result<(), codebook_sql::RebuildError> {
/// let registry = MappingRegistry::survey_2018()?;
/// let ds = load_dataset("all_data.csv", &registry.source_schema(), &LoadOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn load_dataset(
    path: impl AsRef<Path>,
    schema: &Schema,
    options: &LoadOptions,
) -> RebuildResult<DataSet> {
    observed(path.as_ref(), SourceKind::Dataset, options, DataSet::row_count, |path, fmt| {
        match fmt {
            SourceFormat::Csv => dataset::load_dataset_csv(path, schema, options.missing_columns),
            SourceFormat::Excel => {
                load_dataset_excel(path, options.sheet.as_deref(), schema, options.missing_columns)
            }
            SourceFormat::Json => Err(unsupported(SourceKind::Dataset, fmt)),
        }
    })
}

/// Load the codebook (CSV export or workbook).
pub fn load_codebook(path: impl AsRef<Path>, options: &LoadOptions) -> RebuildResult<Codebook> {
    observed(path.as_ref(), SourceKind::Codebook, options, Codebook::len, |path, fmt| {
        match fmt {
            SourceFormat::Csv => codebook::load_codebook_csv(path),
            SourceFormat::Excel => load_codebook_excel(path, options.sheet.as_deref()),
            SourceFormat::Json => Err(unsupported(SourceKind::Codebook, fmt)),
        }
    })
}

/// Load the supplementary reference document (JSON).
pub fn load_supplementary(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> RebuildResult<SupplementaryData> {
    observed(
        path.as_ref(),
        SourceKind::Supplementary,
        options,
        |doc: &SupplementaryData| doc.sections().count(),
        |path, fmt| match fmt {
            SourceFormat::Json => SupplementaryData::from_path(path),
            _ => Err(unsupported(SourceKind::Supplementary, fmt)),
        },
    )
}

fn observed<T>(
    path: &Path,
    kind: SourceKind,
    options: &LoadOptions,
    count: impl Fn(&T) -> usize,
    load: impl FnOnce(&Path, SourceFormat) -> RebuildResult<T>,
) -> RebuildResult<T> {
    let result = match options.format {
        Some(f) => Ok(f),
        None => SourceFormat::from_path(path),
    }
    .and_then(|fmt| {
        let loaded = load(path, fmt)?;
        Ok((fmt, loaded))
    });

    match result {
        Ok((format, loaded)) => {
            let stats = LoadStats {
                records: count(&loaded),
            };
            debug!(kind = ?kind, path = %path.display(), records = stats.records, "loaded input");
            if let Some(obs) = options.observer.as_ref() {
                let ctx = LoadContext {
                    path: path.to_path_buf(),
                    kind,
                    format,
                };
                obs.on_load(&ctx, stats);
            }
            Ok(loaded)
        }
        Err(e) => {
            let ctx = FailureContext::new(RunStage::Load, path.display().to_string());
            report_failure(options.observer.as_ref(), options.alert_at_or_above, &ctx, &e);
            Err(e)
        }
    }
}

fn unsupported(kind: SourceKind, format: SourceFormat) -> RebuildError {
    RebuildError::SchemaMismatch {
        message: format!("{kind:?} input cannot be loaded from {format:?}"),
    }
}

fn load_dataset_excel(
    path: &Path,
    sheet: Option<&str>,
    schema: &Schema,
    missing: MissingColumns,
) -> RebuildResult<DataSet> {
    let _ = (path, sheet, schema, missing);

    #[cfg(feature = "excel")]
    {
        super::excel::load_dataset_excel(path, sheet, schema, missing)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(excel_disabled())
    }
}

fn load_codebook_excel(path: &Path, sheet: Option<&str>) -> RebuildResult<Codebook> {
    let _ = (path, sheet);

    #[cfg(feature = "excel")]
    {
        super::excel::load_codebook_excel(path, sheet)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(excel_disabled())
    }
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> RebuildError {
    RebuildError::SchemaMismatch {
        message: "workbook loading not enabled (enable cargo feature 'excel')".to_string(),
    }
}
