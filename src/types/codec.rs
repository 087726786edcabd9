//! Text cell decoding
//!
//! The server renders every non-LOB cell as text. The column type decides how
//! that text becomes a [`Value`]:
//!
//! | Column type        | Value                          |
//! |--------------------|--------------------------------|
//! | BIT, VARBIT        | `Bytes` (hex text)             |
//! | SHORT, INT, BIGINT | `Integer`                      |
//! | FLOAT              | `Float`                        |
//! | DOUBLE             | `Double`                       |
//! | TIME               | `Time` (`HH:MM:SS`)            |
//! | DATE               | `Date` (`YYYY-MM-DD`)          |
//! | DATETIME           | `DateTime` (with milliseconds) |
//! | TIMESTAMP          | `Timestamp` (seconds)          |
//! | anything else      | `String`                       |

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::constants::CubridType;
use crate::error::{Error, Result};
use crate::row::Value;

/// DATE text format
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// TIME text format
pub const TIME_FORMAT: &str = "%H:%M:%S";
/// DATETIME text format (milliseconds)
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// TIMESTAMP text format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// the server may omit or shorten the fraction on DATETIME cells
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Decode one non-NULL text cell of the given column type
pub fn decode_cell(cubrid_type: CubridType, raw: &[u8]) -> Result<Value> {
    let text = cell_text(cubrid_type, raw)?;
    let value = match cubrid_type {
        CubridType::Bit | CubridType::VarBit => {
            Value::Bytes(hex::decode(text).map_err(|e| conversion(cubrid_type, text, e))?)
        }
        CubridType::Short | CubridType::Int | CubridType::BigInt => Value::Integer(
            text.trim()
                .parse::<i64>()
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::Float => Value::Float(
            text.trim()
                .parse::<f32>()
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::Double => Value::Double(
            text.trim()
                .parse::<f64>()
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::Time => Value::Time(
            NaiveTime::parse_from_str(text, TIME_FORMAT)
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::Date => Value::Date(
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(text, DATETIME_PARSE_FORMAT)
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        CubridType::Timestamp => Value::Timestamp(
            NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .map_err(|e| conversion(cubrid_type, text, e))?,
        ),
        _ => Value::String(text.to_string()),
    };
    Ok(value)
}

fn cell_text(cubrid_type: CubridType, raw: &[u8]) -> Result<&str> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&raw[..end]).map_err(|e| {
        Error::DataConversion(format!("{:?} cell is not valid UTF-8: {}", cubrid_type, e))
    })
}

fn conversion(cubrid_type: CubridType, text: &str, err: impl std::fmt::Display) -> Error {
    Error::DataConversion(format!(
        "cannot decode {:?} value {:?}: {}",
        cubrid_type, text, err
    ))
}
