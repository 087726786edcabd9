//! Write buffer for encoding CAS protocol data
//!
//! Besides plain big-endian writes this buffer knows how to emit CAS request
//! arguments, each of which is an `i32` size followed by that many bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// A buffer for writing CAS protocol data
#[derive(Debug, Default)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
}

impl WriteBuffer {
    /// Create a new WriteBuffer with default capacity
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(256),
        }
    }

    /// Create a new WriteBuffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the buffer contents as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable Bytes
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    // =========================================================================
    // Raw writes
    // =========================================================================

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Write zeros
    pub fn write_zeros(&mut self, n: usize) {
        self.data.put_bytes(0, n);
    }

    /// Write a 16-bit signed integer in big-endian format
    pub fn write_i16_be(&mut self, value: i16) {
        self.data.put_i16(value);
    }

    /// Write a 32-bit signed integer in big-endian format
    pub fn write_i32_be(&mut self, value: i32) {
        self.data.put_i32(value);
    }

    /// Write a 32-bit unsigned integer in big-endian format
    pub fn write_u32_be(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    /// Write a 64-bit signed integer in big-endian format
    pub fn write_i64_be(&mut self, value: i64) {
        self.data.put_i64(value);
    }

    /// Write a 64-bit IEEE float in big-endian format
    pub fn write_f64_be(&mut self, value: f64) {
        self.data.put_f64(value);
    }

    /// Write a string into a NUL-padded field of exactly `width` bytes
    ///
    /// The field must keep a trailing NUL, so `value` may hold at most
    /// `width - 1` bytes. Nothing is written for a value that does not fit.
    pub fn write_fixed_str(&mut self, value: &str, width: usize) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() >= width {
            return Err(Error::DataConversion(format!(
                "{} bytes do not fit a {} byte field",
                bytes.len(),
                width
            )));
        }
        self.data.put_slice(bytes);
        self.data.put_bytes(0, width - bytes.len());
        Ok(())
    }

    /// Write a length-prefixed, NUL-terminated string; `None` writes size 0
    pub fn write_string_with_length(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.data.put_i32(s.len() as i32 + 1);
                self.data.put_slice(s.as_bytes());
                self.data.put_u8(0);
            }
            None => self.data.put_i32(0),
        }
    }

    // =========================================================================
    // CAS request arguments
    // =========================================================================

    /// Write a one-byte argument
    pub fn write_arg_u8(&mut self, value: u8) {
        self.data.put_i32(1);
        self.data.put_u8(value);
    }

    /// Write a four-byte integer argument
    pub fn write_arg_i32(&mut self, value: i32) {
        self.data.put_i32(4);
        self.data.put_i32(value);
    }

    /// Write an eight-byte integer argument
    pub fn write_arg_i64(&mut self, value: i64) {
        self.data.put_i32(8);
        self.data.put_i64(value);
    }

    /// Write an eight-byte float argument
    pub fn write_arg_f64(&mut self, value: f64) {
        self.data.put_i32(8);
        self.data.put_f64(value);
    }

    /// Write a NUL-terminated string argument
    pub fn write_arg_str(&mut self, value: &str) {
        self.write_string_with_length(Some(value));
    }

    /// Write an opaque byte argument
    pub fn write_arg_bytes(&mut self, value: &[u8]) {
        self.data.put_i32(value.len() as i32);
        self.data.put_slice(value);
    }

    /// Write a zero-size argument (NULL)
    pub fn write_arg_null(&mut self) {
        self.data.put_i32(0);
    }
}
