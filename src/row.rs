//! Row data handling for CUBRID query results
//!
//! This module provides the [`Value`] enum that carries a single cell or
//! parameter, and the [`Row`] type returned by cursors.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Represents a value read from or bound to a CUBRID column.
///
/// # Example
///
/// ```rust
/// use cubrid_rs::Value;
///
/// fn describe(value: &Value) -> String {
///     match value {
///         Value::Null => "NULL".to_string(),
///         Value::Integer(i) => format!("integer {}", i),
///         Value::String(s) => format!("string {}", s),
///         other => format!("{} {}", other.kind_name(), other),
///     }
/// }
///
/// assert_eq!(describe(&Value::Integer(7)), "integer 7");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Integer value (SHORT, INT, BIGINT)
    Integer(i64),
    /// Single precision float (FLOAT)
    Float(f32),
    /// Double precision float (DOUBLE)
    Double(f64),
    /// Character data (CHAR, VARCHAR, NUMERIC text and anything unknown)
    String(String),
    /// Byte array (BIT, VARBIT)
    Bytes(Vec<u8>),
    /// Time of day (TIME)
    Time(NaiveTime),
    /// Calendar date (DATE)
    Date(NaiveDate),
    /// Date and time with milliseconds (DATETIME)
    DateTime(NaiveDateTime),
    /// Date and time with seconds (TIMESTAMP)
    Timestamp(NaiveDateTime),
    /// Contents of a BLOB or CLOB
    Lob(Vec<u8>),
    /// Boolean value; has no CUBRID column type and cannot be bound
    Boolean(bool),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Lob(_) => "lob",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Try to get as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Float(f) => Some(*f as f64),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) | Value::Lob(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as a time of day
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to get as a date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get as a date and time (DATETIME or TIMESTAMP)
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) | Value::Timestamp(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Value::Lob(b) => write!(f, "<LOB: {} bytes>", b.len()),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// A row of data from a query result.
///
/// Values are accessed by 0-based column index or by column name.
///
/// # Example
///
/// ```rust,no_run
/// use cubrid_rs::Connection;
///
/// # async fn example(conn: Connection) -> cubrid_rs::Result<()> {
/// let mut stmt = conn.prepare("SELECT code, name FROM athlete").await?;
/// let mut rows = stmt.query(&[]).await?;
/// while let Some(row) = rows.next().await? {
///     let code = row.get_i64(0);
///     let name = row.get_by_name("name").and_then(|v| v.as_str().map(String::from));
///     println!("{:?} {:?}", code, name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    values: Vec<Value>,
    /// Column names (optional, for named access)
    column_names: Option<Vec<String>>,
}

impl Row {
    /// Create a new row with values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            column_names: None,
        }
    }

    /// Create a new row with values and column names
    pub fn with_names(values: Vec<Value>, names: Vec<String>) -> Self {
        Self {
            values,
            column_names: Some(names),
        }
    }

    /// Get the number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let names = self.column_names.as_ref()?;
        let index = names.iter().position(|n| n.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row and return the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Try to get a string value by index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Try to get an integer value by index
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    /// Try to get a float value by index
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(Value::as_f64)
    }

    /// Try to get a byte value by index
    pub fn get_bytes(&self, index: usize) -> Option<&[u8]> {
        self.get(index).and_then(Value::as_bytes)
    }

    /// Check if a column value is NULL
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).map(Value::is_null).unwrap_or(true)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}
