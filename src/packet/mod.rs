//! CAS frame encoding/decoding
//!
//! This module handles the framing layer: an 8-byte header (payload length
//! and CAS info) followed by the payload.

mod header;

pub use header::{PacketHeader, CAS_INFO_STATUS_ACTIVE};

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{CAS_INFO_SIZE, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};

/// A complete frame with header and payload
#[derive(Debug, Clone)]
pub struct Packet {
    /// The frame header
    pub header: PacketHeader,
    /// The payload (everything after the 8-byte header)
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet with the given header and payload
    pub fn new(header: PacketHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a packet from raw bytes
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let header = PacketHeader::parse(&data)?;
        let payload = data.slice(PACKET_HEADER_SIZE..);
        if payload.len() != header.length as usize {
            return Err(Error::Protocol(format!(
                "frame declares {} payload bytes but carries {}",
                header.length,
                payload.len()
            )));
        }
        Ok(Self { header, payload })
    }

    /// Frame a payload for sending
    pub fn frame(cas_info: [u8; CAS_INFO_SIZE], payload: &[u8]) -> Bytes {
        let mut buf = WriteBuffer::with_capacity(PACKET_HEADER_SIZE + payload.len());
        PacketHeader::new(payload.len() as u32, cas_info).write(&mut buf);
        buf.write_bytes(payload);
        buf.freeze()
    }

    /// Get the payload size
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}
