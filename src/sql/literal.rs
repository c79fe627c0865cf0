//! SQL literal values and value tuples.

use std::fmt;

/// One SQL literal in an `INSERT` value list.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlLiteral {
    /// `NULL`
    Null,
    /// Integer literal, rendered without a decimal point.
    Integer(i64),
    /// Real literal, always rendered with a decimal point (`12.0`, `0.25`).
    Real(f64),
    /// Single-quoted text literal.
    Text(String),
}

impl SqlLiteral {
    /// The text literal used for ternary flag columns: `'True'` or `'False'`.
    pub fn flag(value: bool) -> Self {
        SqlLiteral::Text(if value { "True" } else { "False" }.to_string())
    }

    pub fn text(value: impl Into<String>) -> Self {
        SqlLiteral::Text(value.into())
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlLiteral::Null => f.write_str("NULL"),
            SqlLiteral::Integer(i) => write!(f, "{i}"),
            SqlLiteral::Real(r) if !r.is_finite() => f.write_str("NULL"),
            SqlLiteral::Real(r) => {
                let s = r.to_string();
                if s.contains('.') {
                    f.write_str(&s)
                } else {
                    write!(f, "{s}.0")
                }
            }
            SqlLiteral::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// One row of literals for a target table, in target column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTuple(Vec<SqlLiteral>);

impl TargetTuple {
    pub fn new(values: Vec<SqlLiteral>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[SqlLiteral] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(v1, v2, ...)`
    pub fn render(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(SqlLiteral::render).collect();
        format!("({})", parts.join(", "))
    }
}

impl From<Vec<SqlLiteral>> for TargetTuple {
    fn from(values: Vec<SqlLiteral>) -> Self {
        Self(values)
    }
}
