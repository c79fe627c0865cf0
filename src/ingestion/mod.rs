//! Loading of run inputs.
//!
//! Most callers should use the entrypoints in [`unified`] ([`load_dataset`], [`load_codebook`],
//! [`load_supplementary`]), which:
//!
//! - auto-detect the format by file extension (or you can override via [`LoadOptions`])
//! - load into the in-memory types the engine consumes
//! - optionally report success/failure/alerts to a [`crate::observer::RebuildObserver`]
//!
//! Format-specific functions are also available under:
//! - [`dataset`] and [`codebook`] (CSV)
//! - `excel` (workbooks, feature `excel`)
//! - [`supplementary`] (JSON)

pub mod codebook;
pub mod dataset;
#[cfg(feature = "excel")]
pub mod excel;
pub mod supplementary;
pub mod unified;

pub use dataset::MissingColumns;
pub use supplementary::{FuelSourceEntry, MaterialEntry, SupplementaryData};
pub use unified::{LoadOptions, SourceFormat, load_codebook, load_dataset, load_supplementary};
