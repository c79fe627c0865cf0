//! End-to-end run: load inputs, generate the script, persist it.

use std::sync::Arc;

use tracing::info;

use crate::config::RebuildConfig;
use crate::engine::{ScriptEngine, SourceInputs};
use crate::error::RebuildResult;
use crate::ingestion::{
    LoadOptions, MissingColumns, SourceFormat, SupplementaryData, load_codebook, load_dataset,
    load_supplementary,
};
use crate::mapping::MappingRegistry;
use crate::observer::{
    FailureContext, LoadContext, LoadStats, RebuildObserver, RunReport, RunStage, SourceKind,
    report_failure,
};
use crate::output::write_script;

/// Run the whole pipeline described by `config`.
///
/// The script is written only after every table has been generated; on any failure the output
/// path is left untouched.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use codebook_sql::config::RebuildConfig;
/// use codebook_sql::observer::StdErrObserver;
///
/// # fn main() -> Result<(), codebook_sql::RebuildError> {
/// let config = RebuildConfig::from_path("rebuild.json")?;
/// let report = codebook_sql::pipeline::run(&config, Some(Arc::new(StdErrObserver)))?;
/// println!("tables={} tuples={}", report.tables.len(), report.total_tuples());
/// # Ok(())
/// # }
/// ```
pub fn run(config: &RebuildConfig, observer: Option<Arc<dyn RebuildObserver>>) -> RebuildResult<RunReport> {
    let options = config.engine_options();
    let alert_at_or_above = options.alert_at_or_above;

    let registry = match &config.paths.registry {
        Some(path) => {
            let registry = MappingRegistry::from_json_path(path).map_err(|e| {
                let ctx = FailureContext::new(RunStage::Load, path.display().to_string());
                report_failure(observer.as_ref(), alert_at_or_above, &ctx, &e);
                e
            })?;
            if let Some(obs) = observer.as_ref() {
                let ctx = LoadContext {
                    path: path.clone(),
                    kind: SourceKind::Registry,
                    format: SourceFormat::Json,
                };
                obs.on_load(&ctx, LoadStats { records: registry.mappings().len() });
            }
            registry
        }
        None => MappingRegistry::survey_2018()?,
    };

    let mut engine = ScriptEngine::new(registry, options)?.with_dependencies(config.dependency_graph());
    if let Some(obs) = observer.clone() {
        engine = engine.with_observer(obs);
    }

    let load_options = |sheet: &Option<String>| LoadOptions {
        format: None,
        sheet: sheet.clone(),
        missing_columns: MissingColumns::Skip,
        observer: observer.clone(),
        alert_at_or_above,
    };

    let dataset = load_dataset(
        &config.paths.dataset,
        &engine.source_schema(),
        &load_options(&config.dataset_sheet),
    )?;
    let codebook = load_codebook(&config.paths.codebook, &load_options(&config.codebook_sheet))?;
    let supplementary: Option<SupplementaryData> = match &config.paths.supplementary {
        Some(path) => Some(load_supplementary(path, &load_options(&None))?),
        None => None,
    };

    let generated = engine.generate(&SourceInputs {
        dataset: &dataset,
        codebook: &codebook,
        supplementary: supplementary.as_ref(),
    })?;

    write_script(&config.paths.output, &generated.text).map_err(|e| {
        let ctx = FailureContext::new(RunStage::Write, config.paths.output.display().to_string());
        report_failure(observer.as_ref(), alert_at_or_above, &ctx, &e);
        e
    })?;
    info!(path = %config.paths.output.display(), bytes = generated.text.len(), "wrote rebuild script");

    let mut report = generated.report;
    report.output = Some(config.paths.output.clone());
    Ok(report)
}
