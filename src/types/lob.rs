//! LOB (Large Object) handles and streaming reads
//!
//! BLOB and CLOB cells never carry their contents. The server sends a handle
//! (type, size and an opaque locator) and the contents are read or written
//! with separate LOB requests on the same connection.

use bytes::Bytes;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::connection::Connection;
use crate::constants::CubridType;
use crate::error::{Error, Result};

/// Reference to a LOB stored on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobHandle {
    lob_type: CubridType,
    size: u64,
    locator: Vec<u8>,
}

impl LobHandle {
    /// Create a handle from its parts
    pub fn new(lob_type: CubridType, size: u64, locator: Vec<u8>) -> Self {
        Self {
            lob_type,
            size,
            locator,
        }
    }

    /// Parse a serialized handle
    ///
    /// Layout: `i32` type code, `i64` size, `i32` locator length, locator.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut buf = ReadBuffer::from_slice(raw);
        let code = buf.read_i32_be()?;
        let lob_type = u8::try_from(code)
            .map(CubridType::from)
            .ok()
            .filter(|t| t.is_lob())
            .ok_or_else(|| Error::Protocol(format!("invalid LOB type code {}", code)))?;
        let size = buf.read_i64_be()?;
        let size = u64::try_from(size)
            .map_err(|_| Error::Protocol(format!("negative LOB size {}", size)))?;
        let locator_len = buf.read_i32_be()?;
        let locator_len = usize::try_from(locator_len)
            .map_err(|_| Error::Protocol(format!("negative LOB locator length {}", locator_len)))?;
        let locator = buf.read_bytes_vec(locator_len)?;
        Ok(Self {
            lob_type,
            size,
            locator,
        })
    }

    /// Serialize the handle for LOB requests and parameter binds
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = WriteBuffer::with_capacity(16 + self.locator.len());
        buf.write_i32_be(self.lob_type.code() as i32);
        buf.write_i64_be(self.size as i64);
        buf.write_i32_be(self.locator.len() as i32);
        buf.write_bytes(&self.locator);
        buf.freeze()
    }

    /// LOB type (BLOB or CLOB)
    pub fn lob_type(&self) -> CubridType {
        self.lob_type
    }

    /// Size of the contents in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Raw locator bytes
    pub fn locator(&self) -> &[u8] {
        &self.locator
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }
}

/// Lazy reader over the contents of one LOB
///
/// Each [`next_chunk`](LobStream::next_chunk) performs one LOB_READ round
/// trip of at most the configured chunk size. The stream can be rewound or
/// advanced with [`seek`](LobStream::seek).
///
/// # Example
///
/// ```rust,no_run
/// # async fn example(conn: cubrid_rs::Connection, handle: cubrid_rs::LobHandle) -> cubrid_rs::Result<()> {
/// let mut stream = conn.lob_stream(handle);
/// while let Some(chunk) = stream.next_chunk().await? {
///     println!("{} bytes", chunk.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LobStream {
    conn: Connection,
    handle: LobHandle,
    position: u64,
    chunk_size: usize,
}

impl LobStream {
    pub(crate) fn new(conn: Connection, handle: LobHandle, chunk_size: usize) -> Self {
        Self {
            conn,
            handle,
            position: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Total size of the LOB in bytes
    pub fn len(&self) -> u64 {
        self.handle.size
    }

    /// Check if the LOB is empty
    pub fn is_empty(&self) -> bool {
        self.handle.size == 0
    }

    /// Offset of the next byte to be read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The handle being read
    pub fn handle(&self) -> &LobHandle {
        &self.handle
    }

    /// Move the read position; offsets past the end are clamped
    pub fn seek(&mut self, offset: u64) {
        self.position = offset.min(self.handle.size);
    }

    /// Read the next chunk, or `None` once the whole LOB has been read
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let remaining = self.handle.size - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        let want = remaining.min(self.chunk_size as u64) as u32;
        let chunk = self
            .conn
            .read_lob_chunk(&self.handle, self.position, want)
            .await?;
        if chunk.is_empty() {
            return Err(Error::Protocol("short LOB read".to_string()));
        }
        if chunk.len() as u64 > remaining {
            return Err(Error::Protocol(format!(
                "LOB read returned {} bytes, only {} remain",
                chunk.len(),
                remaining
            )));
        }
        self.position += chunk.len() as u64;
        Ok(Some(chunk))
    }

    /// Read from the current position to the end into one buffer
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let remaining = (self.handle.size - self.position) as usize;
        let mut data = Vec::with_capacity(remaining.min(self.chunk_size * 4));
        while let Some(chunk) = self.next_chunk().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}
