//! `codebook-sql` turns a survey microdata extract into a deterministic SQL script that empties
//! and reloads every table of a normalized relational schema.
//!
//! A run takes three inputs:
//!
//! - the **dataset**: one row per respondent, one column per survey variable
//!   ([`types::DataSet`])
//! - the **codebook**: variable order, name and a `code=label` value string per variable
//!   ([`codebook::Codebook`])
//! - an optional **supplementary** JSON document with material costs and fuel carbon figures
//!   ([`ingestion::SupplementaryData`])
//!
//! and produces one [`sql::TableRebuildBlock`] per target table: a clear statement followed by a
//! single multi-row `INSERT`. Blocks are ordered so lookup tables load before the primary entity
//! table, which loads before the tables that reference it.
//!
//! ## What gets loaded
//!
//! **File formats (auto-detected by extension):**
//!
//! - **CSV**: `.csv` (dataset and codebook)
//! - **JSON**: `.json` (supplementary reference data, mapping registries, run configuration)
//! - **Excel/workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`,
//!   `.ods`
//!
//! Dataset cells are loaded into [`types::Value`]s; empty cells and the `NA`/`NaN` markers map to
//! [`types::Value::Null`], which renders as `NULL`.
//!
//! ## Quick example: generate a script in memory
//!
//! ```rust
//! use codebook_sql::codebook::{Codebook, CodebookVariable};
//! use codebook_sql::engine::{EngineOptions, ScriptEngine, SourceInputs};
//! use codebook_sql::mapping::{ColumnRule, LookupSource, LookupSpec, MappingRegistry, TableMapping};
//! use codebook_sql::sql::TableRole;
//! use codebook_sql::types::{DataSet, Schema, Value};
//!
//! # fn main() -> Result<(), codebook_sql::RebuildError> {
//! let registry = MappingRegistry::new(
//!     vec![LookupSpec::new("census_regions", LookupSource::CodebookLabels { order: 2 })],
//!     vec![TableMapping::new(
//!         "buildings",
//!         TableRole::Primary,
//!         "PUBID",
//!         vec![
//!             ColumnRule::int("id", "PUBID"),
//!             ColumnRule::code("census_region", "REGION", "census_regions"),
//!         ],
//!     )],
//! )?;
//! let dataset = DataSet::new(
//!     Schema::numeric(["PUBID", "REGION"]),
//!     vec![vec![Value::Float64(1.0), Value::Float64(2.0)]],
//! );
//! let codebook = Codebook::new([CodebookVariable::new(2, "REGION", "1=Northeast\n2=Midwest")]);
//!
//! let engine = ScriptEngine::new(registry, EngineOptions::default())?;
//! let script = engine.generate(&SourceInputs {
//!     dataset: &dataset,
//!     codebook: &codebook,
//!     supplementary: None,
//! })?;
//! assert!(script.text.starts_with("-- Insert into census_regions\n"));
//! assert!(script.text.contains("(2, 'Midwest')"));
//! assert!(script.text.contains("INSERT INTO buildings (id, census_region)\nVALUES\n(1, 2);"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick example: run from a configuration file
//!
//! ```no_run
//! use codebook_sql::config::RebuildConfig;
//!
//! # fn main() -> Result<(), codebook_sql::RebuildError> {
//! let config = RebuildConfig::from_path("rebuild.json")?;
//! let report = codebook_sql::pipeline::run(&config, None)?;
//! println!("tables={} bytes={}", report.tables.len(), report.script_bytes);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: dataset, codebook and supplementary loaders
//! - [`codebook`]: codebook variables and value-string decoding
//! - [`mapping`]: declarative table mappings and the built-in survey registry
//! - [`transform`]: row transformation and lookup-table construction
//! - [`sql`]: literals, rebuild blocks and dependency-ordered assembly
//! - [`engine`]: generation of the whole script, optionally on a thread pool
//! - [`pipeline`], [`config`], [`output`]: end-to-end runs from a configuration file
//! - [`observer`]: load, table and failure callbacks
//! - [`error`]: error types used across the crate

pub mod codebook;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod mapping;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod sql;
pub mod transform;
pub mod types;

pub use error::{RebuildError, RebuildResult};
