//! Transport layer for broker connections
//!
//! The driver never touches sockets directly: everything goes through the
//! [`Transport`] trait, whose core operation is a request/response
//! [`round_trip`](Transport::round_trip). [`TcpTransport`] is the production
//! implementation; tests plug in an in-memory engine.

mod tcp;

pub use tcp::TcpTransport;

use bytes::Bytes;

use crate::constants::{MAX_FRAME_SIZE, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketHeader};

/// Trait for transport implementations
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Send raw bytes to the server
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly `len` bytes from the server
    async fn receive_exact(&mut self, len: usize) -> Result<Bytes>;

    /// Receive one framed response
    ///
    /// Frames announcing more than [`MAX_FRAME_SIZE`] bytes are rejected
    /// before any payload is read.
    async fn receive_packet(&mut self) -> Result<Packet> {
        let header_bytes = self.receive_exact(PACKET_HEADER_SIZE).await?;
        let header = PacketHeader::parse(&header_bytes)?;
        if header.length as usize > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!(
                "frame of {} bytes exceeds the {} byte limit",
                header.length, MAX_FRAME_SIZE
            )));
        }
        let payload = if header.length > 0 {
            self.receive_exact(header.length as usize).await?
        } else {
            Bytes::new()
        };
        Ok(Packet::new(header, payload))
    }

    /// Send a framed request and wait for its response
    async fn round_trip(&mut self, request: &[u8]) -> Result<Packet> {
        self.send(request).await?;
        self.receive_packet().await
    }

    /// Reconnect to another port of the same host (broker redirect)
    async fn reconnect(&mut self, port: u16) -> Result<()>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}
