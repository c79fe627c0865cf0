//! SQL rendering: literals, per-table rebuild blocks and script assembly.
//!
//! - [`SqlLiteral`] / [`TargetTuple`]: the literal spelling downstream loaders rely on
//! - [`build_block`]: clear statement plus a single multi-row insert for one table
//! - [`ScriptAssembler`]: dependency-ordered concatenation of blocks

pub mod assemble;
pub mod block;
pub mod literal;

pub use assemble::{DependencyGraph, ScriptAssembler, TableRole};
pub use block::{build_block, ClearMode, TableRebuildBlock};
pub use literal::{SqlLiteral, TargetTuple};
