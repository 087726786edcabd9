//! CAS protocol messages
//!
//! Each request type builds its payload (function code plus length-prefixed
//! arguments); the connection frames it with the current CAS info. Replies
//! are first checked by [`Response::from_packet`], which turns a negative
//! response code into an engine error.

mod connect;
mod execute;
mod fetch;
mod lob_op;
mod prepare;
mod response;
mod simple;

pub use connect::{parse_broker_port, ClientInfoMessage, OpenDatabaseMessage, OpenDatabaseReply};
pub use execute::{ExecuteMessage, ExecuteReply};
pub use fetch::{parse_fetch_reply, FetchMessage, RawCell, RawTuple};
pub use lob_op::{parse_lob_new_reply, parse_lob_read_reply, LobOpMessage};
pub use prepare::{ColumnInfoLayout, PrepareMessage, PrepareReply};
pub use response::Response;
pub use simple::{parse_last_insert_id, CloseReqHandleMessage, EndTranMessage, SimpleFunctionMessage};
