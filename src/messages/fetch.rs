//! FETCH request and raw tuple decoding

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{FunctionCode, OID_SIZE};
use crate::error::{Error, Result};

use super::Response;

/// FETCH request for the next batch of rows
#[derive(Debug, Clone, Copy)]
pub struct FetchMessage {
    handle: i32,
    position: i32,
    fetch_size: u32,
}

impl FetchMessage {
    /// Fetch up to `fetch_size` rows starting at 1-based `position`
    pub fn new(handle: i32, position: i32, fetch_size: u32) -> Self {
        Self {
            handle,
            position,
            fetch_size,
        }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        let fetch_size = i32::try_from(self.fetch_size)
            .map_err(|_| Error::InvalidFetchSize(self.fetch_size))?;
        let mut buf = WriteBuffer::with_capacity(48);
        buf.write_u8(FunctionCode::Fetch as u8);
        buf.write_arg_i32(self.handle);
        buf.write_arg_i32(self.position);
        buf.write_arg_i32(fetch_size);
        // case-sensitive names off, first result set
        buf.write_arg_u8(0);
        buf.write_arg_i32(0);
        Ok(buf.freeze())
    }
}

/// One cell as sent by the server
#[derive(Debug, Clone)]
pub struct RawCell {
    /// Payload size; zero or negative means NULL
    pub indicator: i32,
    /// Payload bytes (empty for NULL)
    pub data: Bytes,
}

impl RawCell {
    /// Check whether the cell is NULL
    pub fn is_null(&self) -> bool {
        self.indicator <= 0
    }
}

/// One row as sent by the server
#[derive(Debug, Clone)]
pub struct RawTuple {
    /// 1-based row index within the result set
    pub index: i32,
    /// Cells in column order
    pub cells: Vec<RawCell>,
}

/// Parse a FETCH reply into raw tuples
pub fn parse_fetch_reply(mut response: Response, column_count: usize) -> Result<Vec<RawTuple>> {
    let body = &mut response.body;
    let tuple_count = body.read_i32_be()?;
    if tuple_count < 0 {
        return Err(Error::Protocol(format!(
            "negative tuple count {} in fetch reply",
            tuple_count
        )));
    }

    // every tuple carries at least its index and OID
    let min_tuple_size = 4 + OID_SIZE;
    let capacity = (tuple_count as usize).min(body.remaining() / min_tuple_size);
    let mut tuples = Vec::with_capacity(capacity);
    for _ in 0..tuple_count {
        let index = body.read_i32_be()?;
        body.skip(OID_SIZE)?;
        let mut cells = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let indicator = body.read_i32_be()?;
            let data = if indicator > 0 {
                body.read_bytes_owned(indicator as usize)?
            } else {
                Bytes::new()
            };
            cells.push(RawCell { indicator, data });
        }
        tuples.push(RawTuple { index, cells });
    }
    Ok(tuples)
}
