//! Forward-only result cursors
//!
//! [`Rows`] walks a query result in batches: each FETCH asks the server for
//! up to `fetch_size` rows starting at the next 1-based position, and the
//! batch is drained locally before the next request. The stream ends when
//! the server reports no more data or returns an empty batch.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example(conn: cubrid_rs::Connection) -> cubrid_rs::Result<()> {
//! use cubrid_rs::Value;
//!
//! let mut stmt = conn.prepare("SELECT code, name FROM athlete").await?;
//! let mut rows = stmt.query(&[]).await?;
//!
//! let mut dest = vec![Value::Null; rows.columns().len()];
//! while rows.next_into(&mut dest).await? {
//!     println!("{} {}", dest[0], dest[1]);
//! }
//! rows.close();
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::messages::RawTuple;
use crate::row::{Row, Value};
use crate::statement::{ColumnInfo, ResultInfo};
use crate::types::{decode_cell, LobHandle};

/// Cursor over the rows of an executed query
#[derive(Debug)]
pub struct Rows {
    conn: Connection,
    /// Statement handle the rows belong to
    handle: i32,
    info: ResultInfo,
    fetch_size: u32,
    /// 1-based position of the next row to request
    position: i32,
    buffer: VecDeque<RawTuple>,
    exhausted: bool,
    closed: bool,
}

impl Rows {
    pub(crate) fn new(conn: Connection, handle: i32, info: ResultInfo, fetch_size: u32) -> Self {
        Self {
            conn,
            handle,
            info,
            fetch_size,
            position: 1,
            buffer: VecDeque::new(),
            exhausted: false,
            closed: false,
        }
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        self.info.column_names()
    }

    /// Column descriptors
    pub fn column_info(&self) -> &[ColumnInfo] {
        self.info.columns()
    }

    /// Result metadata, including the row count reported by EXECUTE
    pub fn result_info(&self) -> &ResultInfo {
        &self.info
    }

    /// Rows per FETCH request
    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Check if the cursor has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advance to the next row
    ///
    /// Returns `Ok(None)` at the end of the result set.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        let Some(tuple) = self.next_tuple().await? else {
            return Ok(None);
        };
        let values = self.decode_tuple(tuple).await?;
        Ok(Some(Row::with_names(
            values,
            self.info.column_names().to_vec(),
        )))
    }

    /// Decode the next row into `dest`
    ///
    /// Returns `Ok(false)` at the end of the result set. `dest` must have
    /// one slot per column and is left untouched unless every cell decodes.
    pub async fn next_into(&mut self, dest: &mut [Value]) -> Result<bool> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        let expected = self.info.columns().len();
        if dest.len() != expected {
            return Err(Error::ColumnCountMismatch {
                expected,
                actual: dest.len(),
            });
        }
        let Some(tuple) = self.next_tuple().await? else {
            return Ok(false);
        };
        let values = self.decode_tuple(tuple).await?;
        for (slot, value) in dest.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(true)
    }

    /// Drain the remaining rows
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Close the cursor; further reads fail with [`Error::CursorClosed`]
    ///
    /// Closing twice is harmless. The statement stays prepared and can be
    /// executed again.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::trace!(handle = self.handle, "cursor closed");
        }
        self.closed = true;
        self.exhausted = true;
        self.buffer.clear();
    }

    async fn next_tuple(&mut self) -> Result<Option<RawTuple>> {
        if let Some(tuple) = self.buffer.pop_front() {
            return Ok(Some(tuple));
        }
        if self.exhausted {
            return Ok(None);
        }

        let batch = self
            .conn
            .fetch(
                self.handle,
                self.position,
                self.fetch_size,
                self.info.columns().len(),
            )
            .await?;
        if batch.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        tracing::trace!(
            handle = self.handle,
            position = self.position,
            rows = batch.len(),
            "fetched batch"
        );
        self.position = self.position.saturating_add(batch.len() as i32);
        self.buffer.extend(batch);
        Ok(self.buffer.pop_front())
    }

    /// Decode every cell of a row before anything is handed out
    async fn decode_tuple(&self, tuple: RawTuple) -> Result<Vec<Value>> {
        let columns = self.info.columns();
        if tuple.cells.len() != columns.len() {
            return Err(Error::ColumnCountMismatch {
                expected: columns.len(),
                actual: tuple.cells.len(),
            });
        }

        let mut values = Vec::with_capacity(columns.len());
        for (cell, column) in tuple.cells.iter().zip(columns) {
            let value = if cell.is_null() {
                Value::Null
            } else if column.is_lob() {
                let handle = LobHandle::parse(&cell.data)?;
                Value::Lob(self.conn.read_lob(&handle).await?)
            } else {
                decode_cell(column.cubrid_type, &cell.data)?
            };
            values.push(value);
        }
        Ok(values)
    }
}
