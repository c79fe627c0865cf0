//! Run configuration.
//!
//! A [`RebuildConfig`] is a JSON document naming every input and output path explicitly, plus
//! the engine options. Relative paths in a file-loaded configuration resolve against the
//! configuration file's directory.
//!
//! ```rust
//! use codebook_sql::config::RebuildConfig;
//!
//! let config = RebuildConfig::from_json_str(r#"{
//!     "paths": {
//!         "dataset": "raw_data/all_data.csv",
//!         "codebook": "raw_data/2018microdata_codebook.xlsx",
//!         "supplementary": "supplementary_info.json",
//!         "output": "out/rebuild.sql"
//!     },
//!     "codebook_sheet": "2018 CBECS microdata codebook",
//!     "clear_mode": "delete"
//! }"#).unwrap();
//! assert!(config.check_references);
//! assert!(!config.parallel);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::EngineOptions;
use crate::error::RebuildResult;
use crate::observer::RebuildSeverity;
use crate::sql::{ClearMode, DependencyGraph};
use crate::transform::FaultMode;

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub dataset: PathBuf,
    pub codebook: PathBuf,
    /// Required when material or fuel-source lookups are generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplementary: Option<PathBuf>,
    pub output: PathBuf,
    /// JSON mapping registry; the built-in survey registry when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildConfig {
    pub paths: PathsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebook_sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_sheet: Option<String>,
    #[serde(default)]
    pub clear_mode: ClearMode,
    #[serde(default)]
    pub fault_mode: FaultMode,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    #[serde(default = "default_true")]
    pub check_references: bool,
    /// Emit only these tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    /// Extra ordering edges: table → tables it must follow.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl RebuildConfig {
    /// Configuration with default options for the given paths.
    pub fn new(paths: PathsConfig) -> Self {
        Self {
            paths,
            codebook_sheet: None,
            dataset_sheet: None,
            clear_mode: ClearMode::default(),
            fault_mode: FaultMode::default(),
            parallel: false,
            num_threads: None,
            check_references: true,
            tables: None,
            dependencies: BTreeMap::new(),
        }
    }

    pub fn from_json_str(input: &str) -> RebuildResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load a configuration file; relative paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> RebuildResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        Ok(match path.parent() {
            Some(base) => config.resolve_relative_to(base),
            None => config,
        })
    }

    /// Rebase every relative path onto `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.paths.dataset);
        rebase(&mut self.paths.codebook);
        rebase(&mut self.paths.output);
        if let Some(p) = self.paths.supplementary.as_mut() {
            rebase(p);
        }
        if let Some(p) = self.paths.registry.as_mut() {
            rebase(p);
        }
        self
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            clear_mode: self.clear_mode,
            fault_mode: self.fault_mode,
            check_references: self.check_references,
            parallel: self.parallel,
            num_threads: self.num_threads,
            tables: self.tables.clone(),
            alert_at_or_above: RebuildSeverity::Critical,
        }
    }

    /// The configured extra ordering edges as a graph.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (table, deps) in &self.dependencies {
            for dep in deps {
                graph.add_dependency(table, dep);
            }
        }
        graph
    }
}
