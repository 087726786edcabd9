//! Error types for the CUBRID driver
//!
//! This module defines every failure the driver can surface, from broker
//! handshake problems and engine-reported errors down to malformed wire data.
//! Nothing in the driver retries; each error goes straight to the caller.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::constants::error_code;
use crate::statement::Statement;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the CUBRID driver
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// The session handle is closed or invalid. Never retried; reconnect.
    #[error("bad connection")]
    BadConnection,

    /// The transport stream ended unexpectedly
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// The broker refused the client during the handshake
    #[error("connection refused by broker (code {code})")]
    ConnectionRefused { code: i32 },

    /// A round trip did not complete before its deadline
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid connection URL
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Error reported by the database engine, message kept verbatim
    #[error("{message}")]
    Engine { code: i32, message: String },

    // =========================================================================
    // Statement Errors
    // =========================================================================
    /// The engine returned no column descriptors for a query
    #[error("invalid result info")]
    InvalidResultInfo,

    /// The statement was prepared but its parameter count could not be read.
    /// The statement is still usable and can be recovered with
    /// [`Error::into_statement`].
    #[error("prepared statement has no parameter count (code {code})")]
    ParamCountUnavailable { code: i32, statement: Box<Statement> },

    /// A bound value has no wire representation
    #[error("parameter {index}: unsupported value type {kind}")]
    UnsupportedParameterType { index: usize, kind: &'static str },

    /// Fetch batch size must be positive
    #[error("invalid fetch size: {0}")]
    InvalidFetchSize(u32),

    /// A statement was used after close
    #[error("statement is closed")]
    StatementClosed,

    /// Rows were used after close
    #[error("cursor is closed")]
    CursorClosed,

    /// Destination row does not match the result shape
    #[error("row has {actual} values but the result has {expected} columns")]
    ColumnCountMismatch { expected: usize, actual: usize },

    // =========================================================================
    // LOB Errors
    // =========================================================================
    /// A large object is bigger than the configured limit
    #[error("large object of {size} bytes exceeds the {limit} byte limit")]
    OversizeObject { size: u64, limit: u64 },

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// A cell or value could not be converted
    #[error("data conversion error: {0}")]
    DataConversion(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// General protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Buffer underflow - not enough data to read
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a new engine error
    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Error::Engine {
            code,
            message: message.into(),
        }
    }

    /// Engine error code, if this error came from the engine
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Error::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if the engine reported the end of a result set
    pub fn is_no_more_data(&self) -> bool {
        self.engine_code() == Some(error_code::NO_MORE_DATA)
    }

    /// Check if the session is unusable and the caller must reconnect
    pub fn is_bad_connection(&self) -> bool {
        matches!(
            self,
            Error::BadConnection | Error::ConnectionClosed | Error::Timeout(_) | Error::Io(_)
        )
    }

    /// Recover the statement carried by [`Error::ParamCountUnavailable`]
    pub fn into_statement(self) -> Option<Statement> {
        match self {
            Error::ParamCountUnavailable { statement, .. } => Some(*statement),
            _ => None,
        }
    }
}
