//! LOB_NEW / LOB_WRITE / LOB_READ requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{CubridType, FunctionCode};
use crate::error::{Error, Result};
use crate::types::LobHandle;

use super::Response;

#[derive(Debug)]
enum LobOp<'a> {
    Create(CubridType),
    Write {
        handle: &'a LobHandle,
        offset: u64,
        data: &'a [u8],
    },
    Read {
        handle: &'a LobHandle,
        offset: u64,
        length: u32,
    },
}

/// LOB operation request
#[derive(Debug)]
pub struct LobOpMessage<'a> {
    op: LobOp<'a>,
}

impl<'a> LobOpMessage<'a> {
    /// Create a new, empty LOB of the given type
    pub fn new_create(lob_type: CubridType) -> Self {
        Self {
            op: LobOp::Create(lob_type),
        }
    }

    /// Write `data` at `offset`
    pub fn new_write(handle: &'a LobHandle, offset: u64, data: &'a [u8]) -> Self {
        Self {
            op: LobOp::Write {
                handle,
                offset,
                data,
            },
        }
    }

    /// Read up to `length` bytes at `offset`
    pub fn new_read(handle: &'a LobHandle, offset: u64, length: u32) -> Self {
        Self {
            op: LobOp::Read {
                handle,
                offset,
                length,
            },
        }
    }

    /// Build the request payload
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::new();
        match &self.op {
            LobOp::Create(lob_type) => {
                if !lob_type.is_lob() {
                    return Err(Error::Protocol(format!("{:?} is not a LOB type", lob_type)));
                }
                buf.write_u8(FunctionCode::LobNew as u8);
                buf.write_arg_i32(lob_type.code() as i32);
            }
            LobOp::Write {
                handle,
                offset,
                data,
            } => {
                buf.write_u8(FunctionCode::LobWrite as u8);
                buf.write_arg_bytes(&handle.to_bytes());
                buf.write_arg_i64(offset_arg(*offset)?);
                buf.write_arg_bytes(data);
            }
            LobOp::Read {
                handle,
                offset,
                length,
            } => {
                let length = i32::try_from(*length)
                    .map_err(|_| Error::Protocol(format!("LOB read length {} too large", length)))?;
                buf.write_u8(FunctionCode::LobRead as u8);
                buf.write_arg_bytes(&handle.to_bytes());
                buf.write_arg_i64(offset_arg(*offset)?);
                buf.write_arg_i32(length);
            }
        }
        Ok(buf.freeze())
    }
}

fn offset_arg(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| Error::Protocol(format!("LOB offset {} too large", offset)))
}

/// Parse the LOB_NEW reply into a handle
pub fn parse_lob_new_reply(mut response: Response) -> Result<LobHandle> {
    let raw = response.body.read_remaining();
    LobHandle::parse(&raw)
}

/// Parse the LOB_READ reply; the response code is the number of bytes read
pub fn parse_lob_read_reply(mut response: Response) -> Result<Bytes> {
    let count = response.code as usize;
    response.body.read_bytes_owned(count)
}
