//! Observer hooks for load, table and run outcomes.
//!
//! [`crate::engine::ScriptEngine`] and [`crate::pipeline::run`] report to an optional
//! [`RebuildObserver`]: one `on_load` per input file, one `on_table` per emitted block, one
//! `on_complete` per successful run, and `on_failure` (plus `on_alert` at or above the configured
//! threshold) when a stage fails.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RebuildError;
use crate::ingestion::SourceFormat;
use crate::sql::TableRole;

/// Severity of a failed run, used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RebuildSeverity {
    /// The run failed on its input.
    Error,
    /// Critical error (I/O or other infrastructure failures).
    Critical,
}

/// Which input a load event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Dataset,
    Codebook,
    Supplementary,
    Registry,
}

/// Context about one input load.
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub format: SourceFormat,
}

/// Minimal stats reported on a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Dataset rows, codebook variables or supplementary sections.
    pub records: usize,
}

/// Stage of a run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Load,
    Lookup,
    Transform,
    Assemble,
    Write,
}

/// Where a failure happened: the stage and its subject (a path or a table name).
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub stage: RunStage,
    pub subject: String,
}

impl FailureContext {
    pub fn new(stage: RunStage, subject: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
        }
    }
}

/// Outcome of one table block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub role: TableRole,
    /// Dataset rows visited (entries read, for lookup tables).
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub tuples: usize,
}

/// Summary of a successful run, tables in script order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
    pub script_bytes: usize,
    /// Where the script was written, when the run persisted it.
    pub output: Option<PathBuf>,
}

impl RunReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn total_tuples(&self) -> usize {
        self.tables.iter().map(|t| t.tuples).sum()
    }
}

/// Observer interface for run outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait RebuildObserver: Send + Sync {
    /// Called when an input loads successfully.
    fn on_load(&self, _ctx: &LoadContext, _stats: LoadStats) {}

    /// Called for every table block of a successful run, in script order.
    fn on_table(&self, _report: &TableReport) {}

    /// Called once when script generation succeeds.
    fn on_complete(&self, _report: &RunReport) {}

    /// Called when a stage fails.
    fn on_failure(&self, _ctx: &FailureContext, _severity: RebuildSeverity, _error: &RebuildError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Classify an error for observer callbacks.
pub fn severity_for_error(e: &RebuildError) -> RebuildSeverity {
    match e {
        RebuildError::Io(_) => RebuildSeverity::Critical,
        RebuildError::Csv(err) => match err.kind() {
            csv::ErrorKind::Io(_) => RebuildSeverity::Critical,
            _ => RebuildSeverity::Error,
        },
        RebuildError::ThreadPool(_) => RebuildSeverity::Critical,
        _ => RebuildSeverity::Error,
    }
}

/// Report a failure to `observer`, alerting when `severity >= alert_at_or_above`.
pub(crate) fn report_failure(
    observer: Option<&Arc<dyn RebuildObserver>>,
    alert_at_or_above: RebuildSeverity,
    ctx: &FailureContext,
    error: &RebuildError,
) {
    if let Some(obs) = observer {
        let sev = severity_for_error(error);
        obs.on_failure(ctx, sev, error);
        if sev >= alert_at_or_above {
            obs.on_alert(ctx, sev, error);
        }
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RebuildObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn RebuildObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RebuildObserver for CompositeObserver {
    fn on_load(&self, ctx: &LoadContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_load(ctx, stats);
        }
    }

    fn on_table(&self, report: &TableReport) {
        for o in &self.observers {
            o.on_table(report);
        }
    }

    fn on_complete(&self, report: &RunReport) {
        for o in &self.observers {
            o.on_complete(report);
        }
    }

    fn on_failure(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs run events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl RebuildObserver for StdErrObserver {
    fn on_load(&self, ctx: &LoadContext, stats: LoadStats) {
        eprintln!(
            "[rebuild][load] kind={:?} format={:?} path={} records={}",
            ctx.kind,
            ctx.format,
            ctx.path.display(),
            stats.records
        );
    }

    fn on_table(&self, report: &TableReport) {
        eprintln!(
            "[rebuild][table] {} role={:?} rows={} skipped={} tuples={}",
            report.table, report.role, report.rows_seen, report.rows_skipped, report.tuples
        );
    }

    fn on_complete(&self, report: &RunReport) {
        eprintln!(
            "[rebuild][ok] tables={} tuples={} bytes={}",
            report.tables.len(),
            report.total_tuples(),
            report.script_bytes
        );
    }

    fn on_failure(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        eprintln!(
            "[rebuild][{:?}] stage={:?} subject={} err={}",
            severity, ctx.stage, ctx.subject, error
        );
    }

    fn on_alert(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        eprintln!(
            "[ALERT][rebuild][{:?}] stage={:?} subject={} err={}",
            severity, ctx.stage, ctx.subject, error
        );
    }
}

/// Appends run events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl RebuildObserver for FileObserver {
    fn on_load(&self, ctx: &LoadContext, stats: LoadStats) {
        self.append_line(&format!(
            "{} load kind={:?} format={:?} path={} records={}",
            unix_ts(),
            ctx.kind,
            ctx.format,
            ctx.path.display(),
            stats.records
        ));
    }

    fn on_table(&self, report: &TableReport) {
        self.append_line(&format!(
            "{} table={} role={:?} rows={} skipped={} tuples={}",
            unix_ts(),
            report.table,
            report.role,
            report.rows_seen,
            report.rows_skipped,
            report.tuples
        ));
    }

    fn on_complete(&self, report: &RunReport) {
        self.append_line(&format!(
            "{} ok tables={} tuples={} bytes={}",
            unix_ts(),
            report.tables.len(),
            report.total_tuples(),
            report.script_bytes
        ));
    }

    fn on_failure(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        self.append_line(&format!(
            "{} fail severity={:?} stage={:?} subject={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            ctx.subject,
            error
        ));
    }

    fn on_alert(&self, ctx: &FailureContext, severity: RebuildSeverity, error: &RebuildError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} stage={:?} subject={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            ctx.subject,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
