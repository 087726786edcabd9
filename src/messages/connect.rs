//! Broker handshake messages
//!
//! Connecting is a two-step exchange outside the normal framing: a 10-byte
//! client info block answered by a bare port number, then a fixed-size
//! open-database block answered by a regular framed response.

use bytes::Bytes;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constants::handshake::{
    BROKER_INFO_PROTO_VERSION, CLIENT_INFO_SIZE, CLIENT_TYPE_CCI, DB_NAME_SIZE, DB_PASSWORD_SIZE,
    DB_USER_SIZE, MAGIC, OPEN_DATABASE_SIZE, PROTOCOL_VERSION, RESERVED_SIZE, URL_EXTENSION_SIZE,
    VERSION_FLAG,
};
use crate::constants::{BROKER_INFO_SIZE, SESSION_ID_SIZE};
use crate::error::{Error, Result};
use crate::packet::Packet;

use super::Response;

/// First message sent on a fresh socket
#[derive(Debug, Clone, Copy)]
pub struct ClientInfoMessage {
    protocol_version: u8,
}

impl ClientInfoMessage {
    /// Client info announcing this driver's protocol version
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Build the raw (unframed) message
    pub fn build(&self) -> Bytes {
        let mut buf = WriteBuffer::with_capacity(CLIENT_INFO_SIZE);
        buf.write_bytes(MAGIC);
        buf.write_u8(CLIENT_TYPE_CCI);
        buf.write_u8(VERSION_FLAG | self.protocol_version);
        buf.write_zeros(CLIENT_INFO_SIZE - MAGIC.len() - 2);
        buf.freeze()
    }
}

impl Default for ClientInfoMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the broker's reply to [`ClientInfoMessage`]
///
/// Returns `None` when the session continues on the current socket and
/// `Some(port)` when the broker hands the client to a CAS on another port.
pub fn parse_broker_port(data: &[u8]) -> Result<Option<u16>> {
    let mut buf = ReadBuffer::from_slice(data);
    let port = buf.read_i32_be()?;
    match port {
        p if p < 0 => Err(Error::ConnectionRefused { code: p }),
        0 => Ok(None),
        p => u16::try_from(p)
            .map(Some)
            .map_err(|_| Error::Protocol(format!("broker redirected to invalid port {}", p))),
    }
}

/// Open-database request carrying credentials
#[derive(Debug, Clone)]
pub struct OpenDatabaseMessage<'a> {
    database: &'a str,
    user: &'a str,
    password: &'a str,
    url_extension: &'a str,
}

impl<'a> OpenDatabaseMessage<'a> {
    /// Create a new open-database request
    pub fn new(database: &'a str, user: &'a str, password: &'a str) -> Self {
        Self {
            database,
            user,
            password,
            url_extension: "",
        }
    }

    /// Set the extra URL properties forwarded to the CAS
    pub fn with_url_extension(mut self, url_extension: &'a str) -> Self {
        self.url_extension = url_extension;
        self
    }

    /// Build the raw (unframed) message
    ///
    /// Every field is fixed-width and NUL-terminated; a value that does not
    /// fit fails with [`Error::InvalidConnectionString`].
    pub fn build(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(OPEN_DATABASE_SIZE);
        let fields = [
            ("database name", self.database, DB_NAME_SIZE),
            ("user name", self.user, DB_USER_SIZE),
            ("password", self.password, DB_PASSWORD_SIZE),
            ("connection properties", self.url_extension, URL_EXTENSION_SIZE),
        ];
        for (name, value, width) in fields {
            buf.write_fixed_str(value, width).map_err(|_| {
                Error::InvalidConnectionString(format!(
                    "{} is longer than {} bytes",
                    name,
                    width - 1
                ))
            })?;
        }
        buf.write_zeros(RESERVED_SIZE);
        Ok(buf.freeze())
    }
}

/// Reply to [`OpenDatabaseMessage`]
#[derive(Debug, Clone)]
pub struct OpenDatabaseReply {
    /// CAS process id, used as the session handle
    pub cas_pid: i32,
    /// CAS info to echo on subsequent requests
    pub cas_info: [u8; 4],
    /// Broker information block
    pub broker_info: [u8; BROKER_INFO_SIZE],
    /// Session id assigned by the CAS
    pub session_id: [u8; SESSION_ID_SIZE],
}

impl OpenDatabaseReply {
    /// Parse the framed reply; a refused login surfaces as an engine error
    pub fn parse(packet: Packet) -> Result<Self> {
        let mut response = Response::from_packet(packet)?;
        let broker_info = response.body.read_array::<BROKER_INFO_SIZE>()?;
        let session_id = response.body.read_array::<SESSION_ID_SIZE>()?;
        Ok(Self {
            cas_pid: response.code,
            cas_info: response.cas_info,
            broker_info,
            session_id,
        })
    }

    /// Protocol version negotiated by the broker
    pub fn protocol_version(&self) -> u8 {
        self.broker_info[BROKER_INFO_PROTO_VERSION] & !VERSION_FLAG
    }
}
