//! Codebook model and decoding.
//!
//! A codebook is the survey's variable dictionary. Each [`CodebookVariable`] is identified by its
//! order index and carries a free-text value/format string with one `code=text` entry per line.
//! Those strings decode into either a [`LabelMap`] (code → label) or a [`RangeMap`]
//! (code → numeric bounds); see [`decode_labels`] and [`decode_ranges`].
//!
//! ```rust
//! use codebook_sql::codebook::{decode_labels, decode_ranges};
//!
//! let labels = decode_labels(2, "1=Northeast\n2=Midwest\nMissing=Not asked").unwrap();
//! assert_eq!(labels.len(), 2);
//! assert_eq!(labels.get(2), Some("Midwest"));
//!
//! let ranges = decode_ranges(22, "02=Before 1946\n03=1946 to 1959").unwrap();
//! assert_eq!(ranges.get(2).map(|r| (r.lower, r.upper)), Some((0, Some(1946))));
//! assert_eq!(ranges.get(3).map(|r| (r.lower, r.upper)), Some((1946, Some(1959))));
//! ```

mod decode;

use std::collections::BTreeMap;

use crate::error::{RebuildError, RebuildResult};

pub use decode::{decode_labels, decode_ranges, MISSING_SENTINEL};

/// One survey variable as described by the codebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebookVariable {
    /// Variable order index (the codebook's stable identifier).
    pub order: u32,
    /// Source column code, e.g. `YRCONC`.
    pub name: String,
    /// Raw value/format string.
    pub values: String,
}

impl CodebookVariable {
    pub fn new(order: u32, name: impl Into<String>, values: impl Into<String>) -> Self {
        Self {
            order,
            name: name.into(),
            values: values.into(),
        }
    }

    /// Decode this variable's value string as a label table.
    pub fn labels(&self) -> RebuildResult<LabelMap> {
        decode_labels(self.order, &self.values)
    }

    /// Decode this variable's value string as a range-category table.
    pub fn ranges(&self) -> RebuildResult<RangeMap> {
        decode_ranges(self.order, &self.values)
    }
}

/// Loaded codebook, keyed by variable order index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    variables: BTreeMap<u32, CodebookVariable>,
}

impl Codebook {
    pub fn new(variables: impl IntoIterator<Item = CodebookVariable>) -> Self {
        Self {
            variables: variables.into_iter().map(|v| (v.order, v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variable by order index.
    pub fn variable(&self, order: u32) -> RebuildResult<&CodebookVariable> {
        self.variables
            .get(&order)
            .ok_or_else(|| RebuildError::MissingReferenceData {
                message: format!("codebook has no variable with order {order}"),
            })
    }

    /// Variable by source column code.
    pub fn variable_named(&self, name: &str) -> Option<&CodebookVariable> {
        self.variables.values().find(|v| v.name == name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &CodebookVariable> {
        self.variables.values()
    }
}

/// Ordered mapping from integer code to label, in codebook line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(i64, String)>,
}

impl LabelMap {
    pub(crate) fn from_entries(entries: Vec<(i64, String)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| label.as_str())
    }

    pub fn contains(&self, code: i64) -> bool {
        self.entries.iter().any(|(c, _)| *c == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(c, l)| (*c, l.as_str()))
    }

    /// Serialize back to the `code=label` line format.
    pub fn to_codebook_string(&self) -> String {
        self.entries
            .iter()
            .map(|(c, l)| format!("{c}={l}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Bounds of one range category.
///
/// `upper` is `None` for open-ended categories such as "2000 or later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub lower: i64,
    pub upper: Option<i64>,
}

/// Ordered mapping from integer code to [`CodeRange`], in codebook line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeMap {
    entries: Vec<(i64, CodeRange)>,
}

impl RangeMap {
    pub(crate) fn from_entries(entries: Vec<(i64, CodeRange)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: i64) -> Option<CodeRange> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, r)| *r)
    }

    pub fn contains(&self, code: i64) -> bool {
        self.entries.iter().any(|(c, _)| *c == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, CodeRange)> + '_ {
        self.entries.iter().map(|(c, r)| (*c, *r))
    }
}
