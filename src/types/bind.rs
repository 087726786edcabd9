//! Parameter encoding
//!
//! Every [`Value`] kind maps to exactly one wire form. LOB contents cannot be
//! sent inline: they come out of [`BindValue::from_value`] as
//! [`BindValue::LobData`] and must be written to the server (yielding a
//! [`LobHandle`]) before the statement executes.

use crate::buffer::WriteBuffer;
use crate::constants::CubridType;
use crate::error::{Error, Result};
use crate::row::Value;

use super::codec::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use super::LobHandle;

/// A parameter in wire form
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// NULL, sent as an empty STRING
    Null,
    /// 8-byte integer
    BigInt(i64),
    /// 8-byte float
    Double(f64),
    /// NUL-terminated text
    String(String),
    /// Zero-length BLOB reference
    EmptyBlob,
    /// LOB contents still to be written to the server
    LobData(Vec<u8>),
    /// Written LOB, sent as its handle
    Lob(LobHandle),
}

impl BindValue {
    /// Encode the parameter at 1-based position `index`
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let bind = match value {
            Value::Null => BindValue::Null,
            Value::Integer(i) => BindValue::BigInt(*i),
            Value::Float(f) => BindValue::Double(*f as f64),
            Value::Double(d) => BindValue::Double(*d),
            Value::String(s) => BindValue::String(s.clone()),
            Value::Bytes(b) | Value::Lob(b) if b.is_empty() => BindValue::EmptyBlob,
            Value::Bytes(b) | Value::Lob(b) => BindValue::LobData(b.clone()),
            Value::DateTime(dt) | Value::Timestamp(dt) => {
                BindValue::String(dt.format(DATETIME_FORMAT).to_string())
            }
            Value::Date(d) => BindValue::String(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => BindValue::String(t.format(TIME_FORMAT).to_string()),
            Value::Boolean(_) => {
                return Err(Error::UnsupportedParameterType {
                    index,
                    kind: value.kind_name(),
                })
            }
        };
        Ok(bind)
    }

    /// Column type announced ahead of the value
    pub fn cubrid_type(&self) -> CubridType {
        match self {
            BindValue::Null | BindValue::String(_) => CubridType::String,
            BindValue::BigInt(_) => CubridType::BigInt,
            BindValue::Double(_) => CubridType::Double,
            BindValue::EmptyBlob | BindValue::LobData(_) => CubridType::Blob,
            BindValue::Lob(handle) => handle.lob_type(),
        }
    }

    /// Write the value argument
    pub fn write_to(&self, buf: &mut WriteBuffer) -> Result<()> {
        match self {
            BindValue::Null | BindValue::EmptyBlob => buf.write_arg_null(),
            BindValue::BigInt(i) => buf.write_arg_i64(*i),
            BindValue::Double(d) => buf.write_arg_f64(*d),
            BindValue::String(s) => buf.write_arg_str(s),
            BindValue::Lob(handle) => buf.write_arg_bytes(&handle.to_bytes()),
            BindValue::LobData(_) => {
                return Err(Error::Protocol(
                    "LOB parameter has not been written to the server".to_string(),
                ))
            }
        }
        Ok(())
    }
}

/// Encode a parameter list, failing on the first unsupported value
pub fn encode_params(params: &[Value]) -> Result<Vec<BindValue>> {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| BindValue::from_value(i + 1, value))
        .collect()
}
