//! CAS broker protocol constants
//!
//! Function codes, type codes and status codes are defined by the engine; the
//! names here map 1:1 onto the engine's own.

// =============================================================================
// Framing
// =============================================================================

/// Size of the `length` prefix of every framed message
pub const LENGTH_SIZE: usize = 4;

/// Size of the CAS info block following the length prefix
pub const CAS_INFO_SIZE: usize = 4;

/// Size of the full frame header (length + CAS info)
pub const PACKET_HEADER_SIZE: usize = LENGTH_SIZE + CAS_INFO_SIZE;

/// Largest reply payload accepted from the server
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

/// Size of the broker info block in the open-database reply
pub const BROKER_INFO_SIZE: usize = 8;

/// Size of the session id in the open-database reply
pub const SESSION_ID_SIZE: usize = 20;

// =============================================================================
// Handshake
// =============================================================================

/// Broker handshake constants
#[allow(missing_docs)]
pub mod handshake {
    pub const MAGIC: &[u8; 5] = b"CUBRK";
    pub const CLIENT_INFO_SIZE: usize = 10;
    pub const CLIENT_TYPE_CCI: u8 = 1;
    /// Set on the version byte to announce a versioned protocol
    pub const VERSION_FLAG: u8 = 0x40;
    /// Highest protocol version this client speaks
    pub const PROTOCOL_VERSION: u8 = 7;
    /// First protocol version that sends the 10.x column descriptor layout
    pub const PROTOCOL_V10_LAYOUT: u8 = 6;
    /// Index of the protocol version inside the broker info block
    pub const BROKER_INFO_PROTO_VERSION: usize = 4;

    pub const DB_NAME_SIZE: usize = 32;
    pub const DB_USER_SIZE: usize = 32;
    pub const DB_PASSWORD_SIZE: usize = 32;
    pub const URL_EXTENSION_SIZE: usize = 512;
    pub const RESERVED_SIZE: usize = 20;
    pub const OPEN_DATABASE_SIZE: usize =
        DB_NAME_SIZE + DB_USER_SIZE + DB_PASSWORD_SIZE + URL_EXTENSION_SIZE + RESERVED_SIZE;
}

// =============================================================================
// Function Codes
// =============================================================================

/// CAS function codes (first byte of every request payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// Commit or rollback
    EndTran = 1,
    /// Prepare a statement
    Prepare = 2,
    /// Execute a prepared statement
    Execute = 3,
    /// Release a statement handle
    CloseReqHandle = 6,
    /// Fetch a batch of tuples
    Fetch = 8,
    /// Disconnect the session
    ConClose = 31,
    /// Liveness check
    CheckCas = 32,
    /// Create a large object
    LobNew = 35,
    /// Write into a large object
    LobWrite = 36,
    /// Read from a large object
    LobRead = 37,
    /// Last AUTO_INCREMENT value of the session
    GetLastInsertId = 40,
}

impl TryFrom<u8> for FunctionCode {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FunctionCode::EndTran),
            2 => Ok(FunctionCode::Prepare),
            3 => Ok(FunctionCode::Execute),
            6 => Ok(FunctionCode::CloseReqHandle),
            8 => Ok(FunctionCode::Fetch),
            31 => Ok(FunctionCode::ConClose),
            32 => Ok(FunctionCode::CheckCas),
            35 => Ok(FunctionCode::LobNew),
            36 => Ok(FunctionCode::LobWrite),
            37 => Ok(FunctionCode::LobRead),
            40 => Ok(FunctionCode::GetLastInsertId),
            _ => Err(crate::error::Error::Protocol(format!(
                "unknown function code {}",
                value
            ))),
        }
    }
}

// =============================================================================
// Column Types
// =============================================================================

/// CUBRID column and parameter types
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubridType {
    Null,
    Char,
    /// VARCHAR
    String,
    NChar,
    VarNChar,
    Bit,
    VarBit,
    Numeric,
    /// INTEGER
    Int,
    Short,
    Monetary,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    Set,
    Multiset,
    Sequence,
    Object,
    ResultSet,
    BigInt,
    DateTime,
    Blob,
    Clob,
    Enum,
    /// A code this driver does not know; decoded as text
    Unknown(u8),
}

impl CubridType {
    /// The engine's numeric code for this type
    pub fn code(self) -> u8 {
        match self {
            CubridType::Null => 0,
            CubridType::Char => 1,
            CubridType::String => 2,
            CubridType::NChar => 3,
            CubridType::VarNChar => 4,
            CubridType::Bit => 5,
            CubridType::VarBit => 6,
            CubridType::Numeric => 7,
            CubridType::Int => 8,
            CubridType::Short => 9,
            CubridType::Monetary => 10,
            CubridType::Float => 11,
            CubridType::Double => 12,
            CubridType::Date => 13,
            CubridType::Time => 14,
            CubridType::Timestamp => 15,
            CubridType::Set => 16,
            CubridType::Multiset => 17,
            CubridType::Sequence => 18,
            CubridType::Object => 19,
            CubridType::ResultSet => 20,
            CubridType::BigInt => 21,
            CubridType::DateTime => 22,
            CubridType::Blob => 23,
            CubridType::Clob => 24,
            CubridType::Enum => 25,
            CubridType::Unknown(code) => code,
        }
    }

    /// Check if values of this type are referenced through a LOB handle
    pub fn is_lob(self) -> bool {
        matches!(self, CubridType::Blob | CubridType::Clob)
    }

    /// Check if this is a fixed or varying bit string
    pub fn is_bit(self) -> bool {
        matches!(self, CubridType::Bit | CubridType::VarBit)
    }
}

impl From<u8> for CubridType {
    fn from(code: u8) -> Self {
        match code {
            0 => CubridType::Null,
            1 => CubridType::Char,
            2 => CubridType::String,
            3 => CubridType::NChar,
            4 => CubridType::VarNChar,
            5 => CubridType::Bit,
            6 => CubridType::VarBit,
            7 => CubridType::Numeric,
            8 => CubridType::Int,
            9 => CubridType::Short,
            10 => CubridType::Monetary,
            11 => CubridType::Float,
            12 => CubridType::Double,
            13 => CubridType::Date,
            14 => CubridType::Time,
            15 => CubridType::Timestamp,
            16 => CubridType::Set,
            17 => CubridType::Multiset,
            18 => CubridType::Sequence,
            19 => CubridType::Object,
            20 => CubridType::ResultSet,
            21 => CubridType::BigInt,
            22 => CubridType::DateTime,
            23 => CubridType::Blob,
            24 => CubridType::Clob,
            25 => CubridType::Enum,
            other => CubridType::Unknown(other),
        }
    }
}

// =============================================================================
// Statement Flags
// =============================================================================

/// Prepare flags
#[allow(missing_docs)]
pub mod prepare_flag {
    pub const NORMAL: u8 = 0x00;
    pub const INCLUDE_OID: u8 = 0x01;
    pub const UPDATABLE: u8 = 0x02;
}

/// Execute flags
#[allow(missing_docs)]
pub mod exec_flag {
    pub const NORMAL: u8 = 0x00;
    pub const ASYNC: u8 = 0x01;
    pub const QUERY_ALL: u8 = 0x02;
}

/// Transaction end types for END_TRAN
#[allow(missing_docs)]
pub mod tran_type {
    pub const COMMIT: u8 = 1;
    pub const ROLLBACK: u8 = 2;
}

// =============================================================================
// Status Codes
// =============================================================================

/// Engine status codes the driver reacts to
#[allow(missing_docs)]
pub mod error_code {
    pub const DBMS: i32 = -20001;
    pub const CON_HANDLE: i32 = -20002;
    pub const COMMUNICATION: i32 = -20004;
    /// End of result set; not a failure
    pub const NO_MORE_DATA: i32 = -20005;
    pub const REQ_HANDLE: i32 = -20009;
}

// =============================================================================
// Defaults
// =============================================================================

/// Default broker port
pub const DEFAULT_PORT: u16 = 33000;

/// Rows materialized per FETCH round trip
pub const DEFAULT_FETCH_SIZE: u32 = 100;

/// Largest LOB read/write issued in one request
pub const DEFAULT_LOB_CHUNK_SIZE: usize = 128 * 1024;

/// Size of the OID that prefixes each fetched tuple
pub const OID_SIZE: usize = 8;
