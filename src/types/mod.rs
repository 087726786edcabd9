//! CUBRID data type encoding and decoding
//!
//! Cells arrive as text and are turned into [`Value`](crate::Value)s by
//! [`decode_cell`]; parameters go the other way through [`BindValue`]. LOB
//! contents never travel inline and are referenced through a [`LobHandle`].

mod bind;
mod codec;
mod lob;
mod nullable;

pub use bind::{encode_params, BindValue};
pub use codec::{
    decode_cell, DATETIME_FORMAT, DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT,
};
pub use lob::{LobHandle, LobStream};
pub use nullable::{NullBytes, NullTime};
