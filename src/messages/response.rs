//! Generic reply handling

use crate::buffer::read::decode_c_string;
use crate::buffer::ReadBuffer;
use crate::constants::CAS_INFO_SIZE;
use crate::error::{Error, Result};
use crate::packet::Packet;

/// A successful reply: non-negative response code plus the rest of the body
#[derive(Debug)]
pub struct Response {
    /// CAS info carried by the frame
    pub cas_info: [u8; CAS_INFO_SIZE],
    /// Response code (meaning depends on the function)
    pub code: i32,
    /// Body following the response code
    pub body: ReadBuffer,
}

impl Response {
    /// Split a reply frame into code and body
    ///
    /// A negative response code is followed by the engine error code and a
    /// NUL-terminated message; both are returned as [`Error::Engine`].
    pub fn from_packet(packet: Packet) -> Result<Self> {
        let cas_info = packet.header.cas_info;
        let mut body = ReadBuffer::new(packet.payload);
        let code = body.read_i32_be()?;
        if code < 0 {
            return Err(read_engine_error(code, &mut body));
        }
        Ok(Self {
            cas_info,
            code,
            body,
        })
    }
}

fn read_engine_error(code: i32, body: &mut ReadBuffer) -> Error {
    let engine_code = if body.has_remaining(4) {
        body.read_i32_be().unwrap_or(code)
    } else {
        code
    };
    let raw = body.read_remaining();
    let message = decode_c_string(&raw)
        .unwrap_or_else(|_| String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string());
    Error::engine(engine_code, message)
}
