//! Requests whose replies carry nothing but a status code

use bytes::Bytes;

use crate::buffer::read::decode_c_string;
use crate::buffer::WriteBuffer;
use crate::constants::FunctionCode;
use crate::error::{Error, Result};

use super::Response;

/// END_TRAN request (commit or rollback)
#[derive(Debug, Clone, Copy)]
pub struct EndTranMessage {
    tran_type: u8,
}

impl EndTranMessage {
    /// Create a request; see [`crate::constants::tran_type`]
    pub fn new(tran_type: u8) -> Self {
        Self { tran_type }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(8);
        buf.write_u8(FunctionCode::EndTran as u8);
        buf.write_arg_u8(self.tran_type);
        Ok(buf.freeze())
    }
}

/// CLOSE_REQ_HANDLE request
#[derive(Debug, Clone, Copy)]
pub struct CloseReqHandleMessage {
    handle: i32,
}

impl CloseReqHandleMessage {
    /// Release a server-side statement handle
    pub fn new(handle: i32) -> Self {
        Self { handle }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(16);
        buf.write_u8(FunctionCode::CloseReqHandle as u8);
        buf.write_arg_i32(self.handle);
        // no auto-commit on close
        buf.write_arg_u8(0);
        Ok(buf.freeze())
    }
}

/// Argument-less request (CON_CLOSE, CHECK_CAS, GET_LAST_INSERT_ID)
#[derive(Debug, Clone, Copy)]
pub struct SimpleFunctionMessage {
    function: FunctionCode,
}

impl SimpleFunctionMessage {
    /// Create a request for `function`
    pub fn new(function: FunctionCode) -> Self {
        Self { function }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(&[self.function as u8]))
    }
}

/// Parse the GET_LAST_INSERT_ID reply
///
/// The id is sent as decimal text; an empty string means no id.
pub fn parse_last_insert_id(mut response: Response) -> Result<Option<i64>> {
    let text = decode_c_string(&response.body.read_remaining())?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| Error::DataConversion(format!("last insert id {:?} is not an integer", text)))
}
