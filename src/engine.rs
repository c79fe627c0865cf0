//! Script generation engine.
//!
//! [`ScriptEngine`] owns a validated [`MappingRegistry`] and the run options. Given the loaded
//! inputs it:
//!
//! - populates every lookup table from the codebook and the supplementary document
//! - drives the dataset through each fact/junction mapping (optionally on a `rayon` pool)
//! - builds one rebuild block per table and hands them to the [`ScriptAssembler`]
//!
//! Parallel and sequential runs produce byte-identical scripts: table outputs are collected in
//! registry order and the assembler imposes the final order.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::codebook::Codebook;
use crate::error::{RebuildError, RebuildResult};
use crate::ingestion::SupplementaryData;
use crate::mapping::{MappingRegistry, TableMapping};
use crate::observer::{
    FailureContext, RebuildObserver, RebuildSeverity, RunReport, RunStage, TableReport,
    report_failure,
};
use crate::sql::{ClearMode, DependencyGraph, ScriptAssembler, TableRebuildBlock, TableRole, build_block};
use crate::transform::{FaultMode, Lookups, TableOutput, TransformOptions, build_lookup, transform_table};
use crate::types::{DataSet, Schema};

/// Configuration for the [`ScriptEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub clear_mode: ClearMode,
    pub fault_mode: FaultMode,
    /// Verify referenced codes against their lookup tables.
    pub check_references: bool,
    /// Build fact-table blocks on a worker pool.
    pub parallel: bool,
    /// Worker count when `parallel` is set. If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Restrict the script to these tables. `None` means every registered table.
    pub tables: Option<Vec<String>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: RebuildSeverity,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            clear_mode: ClearMode::default(),
            fault_mode: FaultMode::default(),
            check_references: true,
            parallel: false,
            num_threads: None,
            tables: None,
            alert_at_or_above: RebuildSeverity::Critical,
        }
    }
}

/// Loaded inputs of one run.
#[derive(Debug, Clone, Copy)]
pub struct SourceInputs<'a> {
    pub dataset: &'a DataSet,
    pub codebook: &'a Codebook,
    /// Needed only when material or fuel-source lookups are part of the run.
    pub supplementary: Option<&'a SupplementaryData>,
}

/// A generated script and its per-table report.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScript {
    pub text: String,
    pub report: RunReport,
}

/// Builds rebuild scripts from loaded inputs.
pub struct ScriptEngine {
    registry: MappingRegistry,
    options: EngineOptions,
    extra_dependencies: DependencyGraph,
    pool: Option<ThreadPool>,
    observer: Option<Arc<dyn RebuildObserver>>,
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("tables", &self.registry.table_names())
            .field("options", &self.options)
            .field("pool_threads", &self.pool.as_ref().map(ThreadPool::current_num_threads))
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl ScriptEngine {
    /// Create an engine.
    ///
    /// Fails with [`RebuildError::UnknownTable`] when `options.tables` names a table the registry
    /// does not know, and with [`RebuildError::InvalidMapping`] for `num_threads == Some(0)`.
    pub fn new(registry: MappingRegistry, options: EngineOptions) -> RebuildResult<Self> {
        if let Some(tables) = &options.tables {
            if let Some(unknown) = tables.iter().find(|t| !registry.contains(t)) {
                return Err(RebuildError::UnknownTable {
                    table: unknown.clone(),
                });
            }
        }

        let pool = if options.parallel {
            if options.num_threads == Some(0) {
                return Err(RebuildError::InvalidMapping {
                    table: "<engine>".to_string(),
                    message: "num_threads must be > 0 when set".to_string(),
                });
            }
            let n_threads = options
                .num_threads
                .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
                .max(1);
            Some(ThreadPoolBuilder::new().num_threads(n_threads).build()?)
        } else {
            None
        };

        Ok(Self {
            registry,
            options,
            extra_dependencies: DependencyGraph::new(),
            pool,
            observer: None,
        })
    }

    /// Add dependency edges beyond the ones the registry declares.
    pub fn with_dependencies(mut self, graph: DependencyGraph) -> Self {
        self.extra_dependencies = graph;
        self
    }

    /// Attach an observer for table/run events.
    pub fn with_observer(mut self, observer: Arc<dyn RebuildObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Numeric schema of the source columns the selected mappings read.
    pub fn source_schema(&self) -> Schema {
        let mut columns: Vec<&str> = Vec::new();
        for source in self.selected_mappings().flat_map(TableMapping::required_sources) {
            if !columns.contains(&source) {
                columns.push(source);
            }
        }
        Schema::numeric(columns)
    }

    /// Dependency graph used to order the script.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = self.registry.dependency_graph();
        graph.merge(&self.extra_dependencies);
        graph
    }

    /// Generate the full rebuild script.
    ///
    /// Nothing is returned but the error when any lookup, table or ordering step fails.
    pub fn generate(&self, inputs: &SourceInputs<'_>) -> RebuildResult<GeneratedScript> {
        let (lookups, mut blocks, mut reports) = self.build_lookups(inputs)?;
        let (fact_blocks, fact_reports) = self.build_tables(inputs, &lookups)?;
        blocks.extend(fact_blocks);
        reports.extend(fact_reports);

        let assembler = ScriptAssembler::new(self.dependency_graph());
        let ordered = assembler
            .order(blocks)
            .map_err(|e| self.fail(RunStage::Assemble, "script", e))?;

        let mut tables = Vec::with_capacity(ordered.len());
        for block in &ordered {
            if let Some(pos) = reports.iter().position(|r| r.table == block.table()) {
                tables.push(reports.swap_remove(pos));
            }
        }
        let text: String = ordered.iter().map(TableRebuildBlock::render).collect();
        let report = RunReport {
            tables,
            script_bytes: text.len(),
            output: None,
        };

        info!(
            tables = report.tables.len(),
            tuples = report.total_tuples(),
            bytes = report.script_bytes,
            "generated rebuild script"
        );
        if let Some(obs) = self.observer.as_ref() {
            for table in &report.tables {
                obs.on_table(table);
            }
            obs.on_complete(&report);
        }

        Ok(GeneratedScript { text, report })
    }

    fn build_lookups(
        &self,
        inputs: &SourceInputs<'_>,
    ) -> RebuildResult<(Lookups, Vec<TableRebuildBlock>, Vec<TableReport>)> {
        // Referenced lookups are loaded for code checks even when their block is not emitted.
        let mut needed: BTreeSet<&str> = BTreeSet::new();
        if self.options.check_references {
            for mapping in self.selected_mappings() {
                needed.extend(mapping.referenced_tables());
            }
        }

        let mut lookups = Lookups::new();
        let mut blocks = Vec::new();
        let mut reports = Vec::new();
        for spec in self.registry.lookups() {
            let emit = self.is_selected(&spec.table);
            if !emit && !needed.contains(spec.table.as_str()) {
                continue;
            }
            let table = build_lookup(spec, inputs.codebook, inputs.supplementary)
                .map_err(|e| self.fail(RunStage::Lookup, &spec.table, e))?;
            debug!(table = %table.table, rows = table.tuples.len(), emit, "built lookup table");

            if emit {
                reports.push(TableReport {
                    table: table.table.clone(),
                    role: TableRole::Lookup,
                    rows_seen: table.tuples.len(),
                    rows_skipped: 0,
                    tuples: table.tuples.len(),
                });
                let block = build_block(&table.table, table.columns, table.tuples, self.options.clear_mode)
                    .map_err(|e| self.fail(RunStage::Lookup, &spec.table, e))?;
                blocks.push(block);
            }
            lookups.insert(table.table, table.lookup);
        }
        Ok((lookups, blocks, reports))
    }

    fn build_tables(
        &self,
        inputs: &SourceInputs<'_>,
        lookups: &Lookups,
    ) -> RebuildResult<(Vec<TableRebuildBlock>, Vec<TableReport>)> {
        let mappings: Vec<&TableMapping> = self.selected_mappings().collect();
        let transform_options = TransformOptions {
            fault_mode: self.options.fault_mode,
            check_references: self.options.check_references,
        };
        let run = |mapping: &TableMapping| transform_table(inputs.dataset, mapping, lookups, transform_options);

        let outputs: Vec<RebuildResult<TableOutput>> = match &self.pool {
            Some(pool) => pool.install(|| mappings.par_iter().map(|m| run(m)).collect()),
            None => {
                let mut out = Vec::with_capacity(mappings.len());
                for mapping in &mappings {
                    let result = run(mapping);
                    let failed = result.is_err();
                    out.push(result);
                    if failed {
                        break;
                    }
                }
                out
            }
        };

        let mut blocks = Vec::with_capacity(outputs.len());
        let mut reports = Vec::with_capacity(outputs.len());
        for (mapping, output) in mappings.iter().zip(outputs) {
            let output = output.map_err(|e| self.fail(RunStage::Transform, &mapping.table, e))?;
            reports.push(TableReport {
                table: output.table.clone(),
                role: mapping.role,
                rows_seen: output.stats.rows_seen,
                rows_skipped: output.stats.rows_skipped,
                tuples: output.stats.tuples,
            });
            let block = build_block(&output.table, output.columns, output.tuples, self.options.clear_mode)
                .map_err(|e| self.fail(RunStage::Transform, &mapping.table, e))?;
            blocks.push(block);
        }
        Ok((blocks, reports))
    }

    fn is_selected(&self, table: &str) -> bool {
        match &self.options.tables {
            Some(tables) => tables.iter().any(|t| t == table),
            None => true,
        }
    }

    fn selected_mappings(&self) -> impl Iterator<Item = &TableMapping> {
        self.registry
            .mappings()
            .iter()
            .filter(|m| self.is_selected(&m.table))
    }

    fn fail(&self, stage: RunStage, subject: &str, error: RebuildError) -> RebuildError {
        let ctx = FailureContext::new(stage, subject);
        report_failure(self.observer.as_ref(), self.options.alert_at_or_above, &ctx, &error);
        error
    }
}
