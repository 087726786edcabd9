//! PREPARE request and column descriptor decoding

use bytes::Bytes;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constants::handshake::PROTOCOL_V10_LAYOUT;
use crate::constants::{prepare_flag, CubridType, FunctionCode};
use crate::error::{Error, Result};
use crate::statement::{ColumnInfo, StatementType};

use super::Response;

/// Column descriptor layout spoken by the server
///
/// Older servers send the column type as a four-byte integer; newer ones
/// send a single byte. The layout is fixed for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnInfoLayout {
    /// 9.x servers
    V9x,
    /// 10.x and later servers
    V10,
}

impl ColumnInfoLayout {
    /// Select the layout for a negotiated protocol version
    pub fn for_protocol(version: u8) -> Self {
        if version < PROTOCOL_V10_LAYOUT {
            ColumnInfoLayout::V9x
        } else {
            ColumnInfoLayout::V10
        }
    }

    /// Decode one column descriptor
    pub fn decode_column(self, buf: &mut ReadBuffer) -> Result<ColumnInfo> {
        let cubrid_type = match self {
            ColumnInfoLayout::V9x => {
                let code = buf.read_i32_be()?;
                let code = u8::try_from(code).map_err(|_| {
                    Error::Protocol(format!("column type code {} out of range", code))
                })?;
                CubridType::from(code)
            }
            ColumnInfoLayout::V10 => CubridType::from(buf.read_u8()?),
        };
        let scale = buf.read_i16_be()?;
        let precision = buf.read_i32_be()?;
        let name = buf.read_string_with_length()?.unwrap_or_default();
        // real attribute name, unused
        buf.read_string_with_length()?;
        let table = buf.read_string_with_length()?.filter(|t| !t.is_empty());
        let nullable = buf.read_u8()? != 0;

        Ok(ColumnInfo {
            name,
            table,
            cubrid_type,
            precision,
            scale,
            nullable,
        })
    }
}

/// PREPARE request
#[derive(Debug)]
pub struct PrepareMessage<'a> {
    sql: &'a str,
    auto_commit: bool,
}

impl<'a> PrepareMessage<'a> {
    /// Create a new prepare request
    pub fn new(sql: &'a str, auto_commit: bool) -> Self {
        Self { sql, auto_commit }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(self.sql.len() + 32);
        buf.write_u8(FunctionCode::Prepare as u8);
        buf.write_arg_str(self.sql);
        buf.write_arg_u8(prepare_flag::NORMAL);
        buf.write_arg_u8(self.auto_commit as u8);
        Ok(buf.freeze())
    }
}

/// Decoded PREPARE reply
#[derive(Debug, Clone)]
pub struct PrepareReply {
    /// Server-side statement handle
    pub handle: i32,
    /// Plan cache lifetime reported by the server
    pub cache_lifetime: i32,
    /// Kind of statement
    pub statement_type: StatementType,
    /// Declared parameter count; negative when the server could not tell
    pub bind_count: i32,
    /// Whether the result set is updatable
    pub updatable: bool,
    /// Result column descriptors (empty for non-queries)
    pub columns: Vec<ColumnInfo>,
}

impl PrepareReply {
    /// Parse a reply using the connection's column layout
    pub fn parse(mut response: Response, layout: ColumnInfoLayout) -> Result<Self> {
        let body = &mut response.body;
        let cache_lifetime = body.read_i32_be()?;
        let statement_type = StatementType::from_code(body.read_u8()?);
        let bind_count = body.read_i32_be()?;
        let updatable = body.read_u8()? != 0;
        let column_count = body.read_i32_be()?;
        if column_count < 0 {
            return Err(Error::InvalidResultInfo);
        }

        // every descriptor takes at least one byte
        let mut columns = Vec::with_capacity((column_count as usize).min(body.remaining()));
        for _ in 0..column_count {
            columns.push(layout.decode_column(body)?);
        }

        Ok(Self {
            handle: response.code,
            cache_lifetime,
            statement_type,
            bind_count,
            updatable,
            columns,
        })
    }
}
