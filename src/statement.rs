//! Prepared statements and result metadata
//!
//! A [`Statement`] is a server-side prepared statement bound to the
//! connection that prepared it. Executing it yields either an [`ExecResult`]
//! (DML/DDL) or a [`Rows`] cursor (queries).

use crate::connection::Connection;
use crate::constants::{exec_flag, CubridType};
use crate::cursor::Rows;
use crate::error::{Error, Result};
use crate::messages::PrepareReply;
use crate::row::Value;
use crate::types::{encode_params, BindValue};

// statement type codes reported by PREPARE
const STMT_INSERT: u8 = 20;
const STMT_SELECT: u8 = 21;
const STMT_UPDATE: u8 = 22;
const STMT_DELETE: u8 = 23;
const STMT_CALL: u8 = 24;
const STMT_LAST_DDL: u8 = 19;

/// Statement type reported by the server at prepare time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    /// Unknown or not reported
    #[default]
    Unknown,
    /// SELECT query
    Query,
    /// DML: INSERT, UPDATE, DELETE
    Dml,
    /// DDL and session statements: CREATE, ALTER, DROP, GRANT, etc.
    Ddl,
    /// Stored procedure call
    Call,
}

impl StatementType {
    /// Map the server's statement code
    pub fn from_code(code: u8) -> Self {
        match code {
            STMT_SELECT => StatementType::Query,
            STMT_INSERT | STMT_UPDATE | STMT_DELETE => StatementType::Dml,
            STMT_CALL => StatementType::Call,
            0..=STMT_LAST_DDL => StatementType::Ddl,
            _ => StatementType::Unknown,
        }
    }
}

/// Metadata for a result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name (or alias)
    pub name: String,
    /// Table the column belongs to, if any
    pub table: Option<String>,
    /// Column type
    pub cubrid_type: CubridType,
    /// Precision
    pub precision: i32,
    /// Scale
    pub scale: i16,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create a new column with minimal info
    pub fn new(name: impl Into<String>, cubrid_type: CubridType) -> Self {
        Self {
            name: name.into(),
            table: None,
            cubrid_type,
            precision: 0,
            scale: 0,
            nullable: true,
        }
    }

    /// Check if the column holds LOB handles
    pub fn is_lob(&self) -> bool {
        self.cubrid_type.is_lob()
    }
}

/// Shape of a result set plus the execution counters that produced it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultInfo {
    columns: Vec<ColumnInfo>,
    names: Vec<String>,
    affected_rows: i64,
    last_insert_id: i64,
}

impl ResultInfo {
    /// Build from column descriptors
    pub fn new(columns: Vec<ColumnInfo>, affected_rows: i64, last_insert_id: i64) -> Self {
        let names = columns.iter().map(|c| c.name.clone()).collect();
        Self {
            columns,
            names,
            affected_rows,
            last_insert_id,
        }
    }

    /// Column descriptors
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Column names in result order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Index of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Rows affected or selected by the execution
    pub fn affected_rows(&self) -> i64 {
        self.affected_rows
    }

    /// Last insert id recorded for the execution (0 when none)
    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }
}

/// Outcome of [`Statement::exec`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: i64,
    last_insert_id: i64,
}

impl ExecResult {
    /// Create a result
    pub fn new(rows_affected: i64, last_insert_id: i64) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    /// Number of rows changed by the statement
    pub fn rows_affected(&self) -> Result<i64> {
        Ok(self.rows_affected)
    }

    /// Id generated by the statement, or 0 when none was reported
    pub fn last_insert_id(&self) -> Result<i64> {
        Ok(self.last_insert_id)
    }
}

/// A prepared statement
///
/// # Example
///
/// ```rust,no_run
/// use cubrid_rs::{Connection, Value};
///
/// # async fn example(conn: Connection) -> cubrid_rs::Result<()> {
/// let mut stmt = conn.prepare("SELECT name FROM athlete WHERE code > ?").await?;
/// assert_eq!(stmt.num_input(), 1);
///
/// let mut rows = stmt.query(&[Value::Integer(10000)]).await?;
/// while let Some(row) = rows.next().await? {
///     println!("{}", row[0]);
/// }
/// rows.close();
/// stmt.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Statement {
    conn: Connection,
    sql: String,
    /// Server-side handle; -1 once closed
    handle: i32,
    statement_type: StatementType,
    bind_count: i32,
    updatable: bool,
    columns: Vec<ColumnInfo>,
    binds: Vec<BindValue>,
    execution_flag: u8,
}

impl Statement {
    pub(crate) fn new(conn: Connection, sql: &str, reply: PrepareReply) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            handle: reply.handle,
            statement_type: reply.statement_type,
            bind_count: reply.bind_count,
            updatable: reply.updatable,
            columns: reply.columns,
            binds: Vec::new(),
            execution_flag: exec_flag::NORMAL,
        }
    }

    /// Get the SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Server-side statement handle; -1 once closed
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Check if the statement has been closed
    pub fn is_closed(&self) -> bool {
        self.handle < 0
    }

    /// Get the statement type
    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    /// Check if this is a query (SELECT)
    pub fn is_query(&self) -> bool {
        self.statement_type == StatementType::Query
    }

    /// Whether the server reported the result set as updatable
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Number of parameters the statement expects (0 if unknown)
    pub fn num_input(&self) -> usize {
        self.bind_count.max(0) as usize
    }

    /// Get the column metadata
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Execution flag sent with EXECUTE (see [`crate::constants::exec_flag`])
    pub fn execution_flag(&self) -> u8 {
        self.execution_flag
    }

    /// Set the execution flag
    pub fn set_execution_flag(&mut self, flag: u8) {
        self.execution_flag = flag;
    }

    /// The connection the statement belongs to
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Encode parameters for the next execution
    ///
    /// Every value is checked: the first one without a wire form fails with
    /// [`Error::UnsupportedParameterType`] and nothing is bound. Non-empty
    /// byte values are uploaded as BLOBs before the statement runs.
    pub async fn bind(&mut self, params: &[Value]) -> Result<()> {
        self.ensure_usable()?;
        let mut binds = encode_params(params)?;
        for bind in binds.iter_mut() {
            if let BindValue::LobData(data) = bind {
                let handle = self.conn.write_lob(CubridType::Blob, data).await?;
                *bind = BindValue::Lob(handle);
            }
        }
        self.binds = binds;
        Ok(())
    }

    /// Execute a non-query statement
    ///
    /// Parameters, when given, replace any earlier binding. The last insert
    /// id is looked up afterwards; if that lookup fails the id is reported
    /// as 0.
    pub async fn exec(&mut self, params: &[Value]) -> Result<ExecResult> {
        self.ensure_usable()?;
        if !params.is_empty() {
            self.bind(params).await?;
        }

        let rows_affected = self
            .conn
            .execute_handle(self.handle, self.execution_flag, &self.binds)
            .await?;

        let last_insert_id = match self.conn.last_insert_id().await {
            Ok(id) => id.unwrap_or(0),
            Err(e) => {
                tracing::warn!(handle = self.handle, error = %e, "last insert id unavailable");
                0
            }
        };

        tracing::trace!(handle = self.handle, rows_affected, last_insert_id, "statement executed");
        Ok(ExecResult::new(rows_affected, last_insert_id))
    }

    /// Execute a query and return a cursor over its rows
    ///
    /// Fails with [`Error::InvalidResultInfo`] when the statement produces no
    /// columns and [`Error::InvalidFetchSize`] when the configured fetch size
    /// is zero.
    pub async fn query(&mut self, params: &[Value]) -> Result<Rows> {
        self.ensure_usable()?;
        if self.columns.is_empty() {
            return Err(Error::InvalidResultInfo);
        }
        let fetch_size = self.conn.config().fetch_size;
        if fetch_size == 0 {
            return Err(Error::InvalidFetchSize(fetch_size));
        }
        if !params.is_empty() {
            self.bind(params).await?;
        }

        let affected_rows = self
            .conn
            .execute_handle(self.handle, self.execution_flag, &self.binds)
            .await?;

        let info = ResultInfo::new(self.columns.clone(), affected_rows, 0);
        Ok(Rows::new(self.conn.clone(), self.handle, info, fetch_size))
    }

    /// Release the server-side statement
    ///
    /// Closing an already closed statement does nothing. Closing a statement
    /// whose connection is gone fails with [`Error::BadConnection`].
    pub async fn close(&mut self) -> Result<()> {
        if self.handle < 0 {
            return Ok(());
        }
        self.conn.ensure_open()?;
        self.conn.close_req_handle(self.handle).await?;
        tracing::trace!(handle = self.handle, "statement closed");
        self.handle = -1;
        self.bind_count = 0;
        self.binds.clear();
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        self.conn.ensure_open()?;
        if self.handle < 0 {
            return Err(Error::StatementClosed);
        }
        Ok(())
    }
}
