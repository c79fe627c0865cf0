//! Core in-memory data model for the loaded survey dataset.
//!
//! The dataset is held as a [`DataSet`]: a [`Schema`] (ordered, typed [`Field`]s named by source
//! column code such as `PUBID` or `REGION`) plus row-major [`Value`] storage. Transformation code
//! reads it through the borrowed [`SourceRow`] view and never mutates it.

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Source column code.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the expected shape of incoming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Schema where every listed column is numeric ([`DataType::Float64`]).
    pub fn numeric<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|c| Field::new(c, DataType::Float64))
                .collect(),
        )
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float. Survey codes arrive in this form even when integral.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// `true` for [`Value::Null`] and for a `NaN` float.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float64(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value.
    ///
    /// Returns `Ok(None)` when missing and `Err(raw)` when the cell holds text.
    pub fn as_number(&self) -> Result<Option<f64>, String> {
        match self {
            Value::Null => Ok(None),
            Value::Float64(f) if f.is_nan() => Ok(None),
            Value::Float64(f) => Ok(Some(*f)),
            Value::Int64(i) => Ok(Some(*i as f64)),
            Value::Utf8(s) => Err(s.clone()),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Borrowed view of row `index`, if present.
    pub fn row(&self, index: usize) -> Option<SourceRow<'_>> {
        self.rows.get(index).map(|values| SourceRow {
            schema: &self.schema,
            values,
            index,
        })
    }

    /// Iterate all rows in source order.
    pub fn source_rows(&self) -> impl Iterator<Item = SourceRow<'_>> {
        self.rows.iter().enumerate().map(|(index, values)| SourceRow {
            schema: &self.schema,
            values,
            index,
        })
    }
}

/// Read-only view of one dataset record, keyed by source column code.
#[derive(Debug, Clone, Copy)]
pub struct SourceRow<'a> {
    schema: &'a Schema,
    values: &'a [Value],
    index: usize,
}

impl<'a> SourceRow<'a> {
    /// Value of column `code`, or `None` if the row has no such column.
    ///
    /// A present column with an empty cell yields `Some(&Value::Null)`.
    pub fn get(&self, code: &str) -> Option<&'a Value> {
        self.schema
            .index_of(code)
            .and_then(|idx| self.values.get(idx))
    }

    /// Zero-based position of the row in its dataset.
    pub fn index(&self) -> usize {
        self.index
    }
}
