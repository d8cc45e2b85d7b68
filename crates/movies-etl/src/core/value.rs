//! SQL value types for store-agnostic row transfer.

use chrono::{DateTime, SecondsFormat, Utc};

/// A single cell read from the source or written to the destination.
///
/// SQLite hands back one of five storage classes; the run-wide timestamp is
/// the only value the engine creates itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// 64-bit signed integer (SQLite INTEGER).
    I64(i64),

    /// 64-bit floating point (SQLite REAL).
    F64(f64),

    /// Text data (SQLite TEXT).
    Text(String),

    /// Binary data (SQLite BLOB).
    Bytes(Vec<u8>),

    /// UTC timestamp, used for generated timestamp columns.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render as a PostgreSQL literal.
    ///
    /// Literals are untyped, so PostgreSQL coerces them to the destination
    /// column's type (text into `uuid` or `date`, for example). Strings use
    /// standard-conforming quoting: only single quotes need doubling.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F64(v) => {
                if v.is_finite() {
                    // Debug keeps a trailing ".0" on whole numbers so the literal stays numeric
                    format!("{:?}", v)
                } else if v.is_nan() {
                    "'NaN'".to_string()
                } else if *v > 0.0 {
                    "'Infinity'".to_string()
                } else {
                    "'-Infinity'".to_string()
                }
            }
            SqlValue::Text(s) => quote_literal(s),
            SqlValue::Bytes(b) => format!("'\\x{}'", hex::encode(b)),
            SqlValue::Timestamp(ts) => {
                quote_literal(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }

    /// Text form of the value, `None` for NULL. Bytes print as `\x` hex,
    /// like a PostgreSQL `bytea` cast to text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::I64(v) => Some(v.to_string()),
            SqlValue::F64(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => Some(format!("\\x{}", hex::encode(b))),
            SqlValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
        }
    }

    /// Check whether `stored`, read back from the destination, holds the same
    /// data as this source value.
    ///
    /// Text forms are compared first. Numbers compare by value (`85` equals
    /// `85.0`) and UUIDs compare case-insensitively.
    pub fn same_data(&self, stored: &SqlValue) -> bool {
        match (self.to_text(), stored.to_text()) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                if a == b {
                    return true;
                }
                if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                    return x == y;
                }
                matches!(
                    (uuid::Uuid::parse_str(&a), uuid::Uuid::parse_str(&b)),
                    (Ok(x), Ok(y)) if x == y
                )
            }
            _ => false,
        }
    }
}

/// Quote a string as a SQL literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A positional row.
pub type Row = Vec<SqlValue>;

/// A page of rows moving from the source to the destination.
///
/// The reader produces batches whose rows follow the requested header order;
/// after mapping, rows follow the descriptor's destination column order.
#[derive(Debug, Default)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Row>,

    /// Zero-based page number within the table.
    pub page: usize,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, page: 0 }
    }

    /// Set the page number.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
