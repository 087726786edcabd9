//! Nullable scan targets for temporal and binary columns

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::row::Value;

/// A date/time that may be NULL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullTime {
    /// The value; the Unix epoch when `valid` is false
    pub time: NaiveDateTime,
    /// Whether the value was present
    pub valid: bool,
}

impl NullTime {
    /// Wrap a present value
    pub fn new(time: NaiveDateTime) -> Self {
        Self { time, valid: true }
    }

    /// Read from a decoded cell
    ///
    /// DATE cells become midnight of that day and TIME cells are placed on
    /// the Unix epoch date.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::DateTime(dt) | Value::Timestamp(dt) => Ok(Self::new(*dt)),
            Value::Date(d) => Ok(Self::new(d.and_time(chrono::NaiveTime::default()))),
            Value::Time(t) => Ok(Self::new(NaiveDateTime::default().date().and_time(*t))),
            other => Err(Error::DataConversion(format!(
                "cannot read {} value as a time",
                other.kind_name()
            ))),
        }
    }
}

impl From<NullTime> for Value {
    fn from(v: NullTime) -> Self {
        if v.valid {
            Value::DateTime(v.time)
        } else {
            Value::Null
        }
    }
}

/// A byte string that may be NULL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullBytes {
    /// The bytes; empty when `valid` is false
    pub data: Vec<u8>,
    /// Whether the value was present
    pub valid: bool,
}

impl NullBytes {
    /// Wrap a present value
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, valid: true }
    }

    /// Read from a decoded cell
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Bytes(b) | Value::Lob(b) => Ok(Self::new(b.clone())),
            other => Err(Error::DataConversion(format!(
                "cannot read {} value as bytes",
                other.kind_name()
            ))),
        }
    }
}

impl From<NullBytes> for Value {
    fn from(v: NullBytes) -> Self {
        if v.valid {
            Value::Bytes(v.data)
        } else {
            Value::Null
        }
    }
}
