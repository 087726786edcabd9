//! Buffer abstractions for CAS protocol encoding/decoding
//!
//! This module provides the buffer types used to read and write big-endian
//! CAS request arguments and response bodies.

pub(crate) mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;
