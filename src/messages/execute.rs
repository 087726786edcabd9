//! EXECUTE request

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{exec_flag, FunctionCode};
use crate::error::Result;
use crate::types::BindValue;

use super::Response;

/// EXECUTE request for a prepared statement handle
#[derive(Debug)]
pub struct ExecuteMessage<'a> {
    handle: i32,
    flag: u8,
    auto_commit: bool,
    binds: &'a [BindValue],
}

impl<'a> ExecuteMessage<'a> {
    /// Create an execute request with no parameters
    pub fn new(handle: i32, auto_commit: bool) -> Self {
        Self {
            handle,
            flag: exec_flag::NORMAL,
            auto_commit,
            binds: &[],
        }
    }

    /// Set the execution flag byte
    pub fn with_flag(mut self, flag: u8) -> Self {
        self.flag = flag;
        self
    }

    /// Attach encoded parameters
    pub fn with_binds(mut self, binds: &'a [BindValue]) -> Self {
        self.binds = binds;
        self
    }

    /// Build the request payload
    ///
    /// Fails if a LOB parameter has not been written to the server yet.
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(64 + self.binds.len() * 16);
        buf.write_u8(FunctionCode::Execute as u8);
        buf.write_arg_i32(self.handle);
        buf.write_arg_u8(self.flag);
        // max column size, max row count: unlimited
        buf.write_arg_i32(0);
        buf.write_arg_i32(0);
        buf.write_arg_u8(self.auto_commit as u8);
        for bind in self.binds {
            buf.write_arg_u8(bind.cubrid_type().code());
            bind.write_to(&mut buf)?;
        }
        Ok(buf.freeze())
    }
}

/// Decoded EXECUTE reply
#[derive(Debug, Clone, Copy)]
pub struct ExecuteReply {
    /// Rows affected (DML) or rows selected (queries)
    pub result_count: i64,
}

impl ExecuteReply {
    /// Parse the reply
    pub fn parse(response: Response) -> Result<Self> {
        Ok(Self {
            result_count: response.code as i64,
        })
    }
}
