//! CAS frame header encoding/decoding
//!
//! Every framed request and response starts with an 8-byte header:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! |      Payload length (u32 BE)      |         CAS info (4 bytes)        |
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! The payload length excludes the header itself. The CAS info block is
//! owned by the server; the client echoes the last one it received.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constants::{CAS_INFO_SIZE, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};

/// CAS info status byte: a transaction is open on the server
pub const CAS_INFO_STATUS_ACTIVE: u8 = 1;

/// Frame header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload length in bytes, header excluded
    pub length: u32,
    /// CAS info block
    pub cas_info: [u8; CAS_INFO_SIZE],
}

impl PacketHeader {
    /// Create a new header
    pub fn new(length: u32, cas_info: [u8; CAS_INFO_SIZE]) -> Self {
        Self { length, cas_info }
    }

    /// Parse a header from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PACKET_HEADER_SIZE {
            return Err(Error::Protocol(format!(
                "frame header too short: expected {} bytes, got {}",
                PACKET_HEADER_SIZE,
                data.len()
            )));
        }
        let mut buf = ReadBuffer::from_slice(&data[..PACKET_HEADER_SIZE]);
        Self::read(&mut buf)
    }

    /// Read a header from a buffer
    pub fn read(buf: &mut ReadBuffer) -> Result<Self> {
        let length = buf.read_u32_be()?;
        let cas_info = buf.read_array::<CAS_INFO_SIZE>()?;
        Ok(Self { length, cas_info })
    }

    /// Write the header to a buffer
    pub fn write(&self, buf: &mut WriteBuffer) {
        buf.write_u32_be(self.length);
        buf.write_bytes(&self.cas_info);
    }

    /// Check whether the server reports an open transaction
    pub fn transaction_active(&self) -> bool {
        self.cas_info[0] == CAS_INFO_STATUS_ACTIVE
    }
}
