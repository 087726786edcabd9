#![warn(missing_docs)]

//! # cubrid-rs
//!
//! A pure Rust async driver for CUBRID databases. No CCI client library
//! required.
//!
//! This crate speaks the CAS broker protocol directly over TCP: it performs
//! the broker handshake, prepares and executes statements, walks result sets
//! in batches and streams BLOB/CLOB contents.
//!
//! ## Features
//!
//! - **Pure Rust** - No native client libraries required
//! - **Async/await** - Built on Tokio; every request honours a deadline
//! - **Typed results** - Cells decode into [`Value`] using `chrono` for
//!   temporal types
//! - **LOB support** - Byte parameters are uploaded as BLOBs; LOB columns are
//!   read in full or streamed with [`LobStream`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cubrid_rs::{Connection, Value};
//!
//! #[tokio::main]
//! async fn main() -> cubrid_rs::Result<()> {
//!     let conn = Connection::connect("cci:CUBRID:localhost:33000:demodb:dba::").await?;
//!
//!     let mut stmt = conn.prepare("SELECT code, name FROM athlete WHERE code < ?").await?;
//!     let mut rows = stmt.query(&[Value::Integer(10100)]).await?;
//!     while let Some(row) = rows.next().await? {
//!         let code = row.get_i64(0).unwrap_or(0);
//!         let name = row.get_string(1).unwrap_or("");
//!         println!("{}: {}", code, name);
//!     }
//!     stmt.close().await?;
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection URL
//!
//! ```text
//! cci:CUBRID:<host>:<port>:<db_name>:<user>:<password>:[?<properties>]
//! ```
//!
//! See [`Config`] for the recognized properties.
//!
//! ## Transactions
//!
//! Auto-commit is off by default.
//!
//! ```rust,no_run
//! # async fn example(conn: cubrid_rs::Connection) -> cubrid_rs::Result<()> {
//! let tx = conn.begin().await?;
//! let mut stmt = conn.prepare("UPDATE accounts SET balance = balance - ? WHERE id = ?").await?;
//! stmt.exec(&[50.0.into(), 1.into()]).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Types
//!
//! | CUBRID Type | [`Value`] variant |
//! |-------------|-------------------|
//! | SHORT, INT, BIGINT | `Integer(i64)` |
//! | FLOAT | `Float(f32)` |
//! | DOUBLE | `Double(f64)` |
//! | CHAR, VARCHAR, NUMERIC, ... | `String` |
//! | BIT, VARBIT | `Bytes(Vec<u8>)` |
//! | DATE | `Date(NaiveDate)` |
//! | TIME | `Time(NaiveTime)` |
//! | DATETIME | `DateTime(NaiveDateTime)` |
//! | TIMESTAMP | `Timestamp(NaiveDateTime)` |
//! | BLOB, CLOB | `Lob(Vec<u8>)` |

pub mod buffer;
pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod messages;
pub mod packet;
pub mod row;
pub mod statement;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use connection::{Connection, ServerInfo, Transaction};
pub use constants::CubridType;
pub use cursor::Rows;
pub use driver::{lookup, register, Connector, CubridDriver};
pub use error::{Error, Result};
pub use messages::ColumnInfoLayout;
pub use row::{Row, Value};
pub use statement::{ColumnInfo, ExecResult, ResultInfo, Statement, StatementType};
pub use transport::{TcpTransport, Transport};
pub use types::{LobHandle, LobStream, NullBytes, NullTime};
