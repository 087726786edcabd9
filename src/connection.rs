//! CUBRID database connection
//!
//! This module provides the main `Connection` type: one broker session over
//! which statements are prepared, transactions are ended and LOBs are read
//! and written.
//!
//! # Example
//!
//! ```rust,no_run
//! use cubrid_rs::{Connection, Value};
//!
//! #[tokio::main]
//! async fn main() -> cubrid_rs::Result<()> {
//!     let conn = Connection::connect("cci:CUBRID:localhost:33000:demodb:dba::").await?;
//!
//!     let mut stmt = conn.prepare("INSERT INTO t (a) VALUES (?)").await?;
//!     let result = stmt.exec(&[Value::Integer(1)]).await?;
//!     println!("{} row(s)", result.rows_affected()?);
//!     stmt.close().await?;
//!
//!     conn.commit().await?;
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::constants::{tran_type, CubridType, FunctionCode, BROKER_INFO_SIZE, CAS_INFO_SIZE, SESSION_ID_SIZE};
use crate::error::{Error, Result};
use crate::messages::{
    parse_broker_port, parse_fetch_reply, parse_last_insert_id, parse_lob_new_reply,
    parse_lob_read_reply, ClientInfoMessage, CloseReqHandleMessage, ColumnInfoLayout,
    EndTranMessage, ExecuteMessage, ExecuteReply, FetchMessage, LobOpMessage,
    OpenDatabaseMessage, OpenDatabaseReply, PrepareMessage, PrepareReply, RawTuple, Response,
    SimpleFunctionMessage,
};
use crate::packet::Packet;
use crate::statement::Statement;
use crate::transport::{TcpTransport, Transport};
use crate::types::{BindValue, LobHandle, LobStream};

/// Server information obtained during connection
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// CAS process id (the session handle)
    pub cas_pid: i32,
    /// Raw broker information block
    pub broker_info: [u8; BROKER_INFO_SIZE],
    /// Negotiated protocol version
    pub protocol_version: u8,
    /// Session id assigned by the CAS
    pub session_id: [u8; SESSION_ID_SIZE],
}

/// Internal connection state shared across async operations
struct ConnectionInner {
    transport: Box<dyn Transport>,
    cas_info: [u8; CAS_INFO_SIZE],
    session_handle: i32,
    tr_start: Option<DateTime<Local>>,
    /// Transaction status reported in the last reply's CAS info
    server_transaction: bool,
    /// Set while a round trip is outstanding; still set on entry means the
    /// previous request was abandoned before its reply was read
    in_flight: bool,
}

struct Shared {
    inner: Mutex<ConnectionInner>,
    config: Config,
    server_info: ServerInfo,
    layout: ColumnInfoLayout,
    closed: AtomicBool,
    id: u32,
}

/// A connection to a CUBRID broker.
///
/// `Connection` is a cheap handle: clones share the same session. Statements,
/// cursors and LOB streams each hold a clone so they can issue requests on
/// the session that created them.
///
/// # Thread Safety
///
/// `Connection` is `Send` and `Sync`, but requests are serialized internally
/// via a mutex: one request/response exchange is in flight per session at a
/// time. Use multiple connections for parallel work.
///
/// # Deadlines
///
/// When [`Config::query_timeout`] is set, every exchange after the handshake
/// must complete within it or fails with [`Error::Timeout`], and the session
/// is closed. The same holds when a request future is dropped before its
/// reply arrives: the reply would otherwise be read by the next request.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

// Connection ID counter
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

impl Connection {
    /// Connect using a `cci:CUBRID:` connection URL
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn example() -> cubrid_rs::Result<()> {
    /// let conn = cubrid_rs::Connection::connect(
    ///     "cci:CUBRID:localhost:33000:demodb:dba::?query_timeout=5000",
    /// )
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        let config: Config = url.parse()?;
        Self::connect_with_config(config).await
    }

    /// Connect over TCP using a [`Config`]
    pub async fn connect_with_config(config: Config) -> Result<Self> {
        let mut transport = TcpTransport::new();
        transport.connect_with_config(&config).await?;
        Self::connect_with_transport(transport, config).await
    }

    /// Open a session over an already connected transport
    ///
    /// Performs the broker handshake (including a redirect to another port
    /// if the broker asks for one) and opens the database. On failure the
    /// transport is closed and no connection is returned.
    pub async fn connect_with_transport<T>(transport: T, config: Config) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut transport: Box<dyn Transport> = Box::new(transport);

        let handshake = tokio::time::timeout(
            config.connect_timeout,
            Self::perform_handshake(transport.as_mut(), &config),
        )
        .await
        .unwrap_or(Err(Error::Timeout(config.connect_timeout)));

        let reply = match handshake {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(id, error = %e, "connect failed");
                let _ = transport.close().await;
                return Err(e);
            }
        };

        let server_info = ServerInfo {
            cas_pid: reply.cas_pid,
            broker_info: reply.broker_info,
            protocol_version: reply.protocol_version(),
            session_id: reply.session_id,
        };
        let layout = ColumnInfoLayout::for_protocol(server_info.protocol_version);
        tracing::debug!(
            id,
            session = reply.cas_pid,
            protocol = server_info.protocol_version,
            ?layout,
            "connection established"
        );

        let inner = ConnectionInner {
            transport,
            cas_info: reply.cas_info,
            session_handle: reply.cas_pid,
            tr_start: None,
            server_transaction: false,
            in_flight: false,
        };

        Ok(Connection {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                config,
                server_info,
                layout,
                closed: AtomicBool::new(false),
                id,
            }),
        })
    }

    async fn perform_handshake(
        transport: &mut dyn Transport,
        config: &Config,
    ) -> Result<OpenDatabaseReply> {
        let url_extension = config.url_extension();
        let open = OpenDatabaseMessage::new(&config.database, &config.username, config.password())
            .with_url_extension(&url_extension)
            .build()?;

        transport.send(&ClientInfoMessage::new().build()).await?;
        let port_reply = transport.receive_exact(4).await?;
        if let Some(port) = parse_broker_port(&port_reply)? {
            tracing::debug!(port, "broker redirected session");
            transport.reconnect(port).await?;
        }
        transport.send(&open).await?;
        let packet = transport.receive_packet().await?;
        OpenDatabaseReply::parse(packet)
    }

    /// Get the connection ID (process-local, for logging)
    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// The configuration this connection was opened with
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Get server information
    pub fn server_info(&self) -> &ServerInfo {
        &self.shared.server_info
    }

    /// Negotiated protocol version
    pub fn protocol_version(&self) -> u8 {
        self.shared.server_info.protocol_version
    }

    /// Column descriptor layout used on this connection
    pub fn column_layout(&self) -> ColumnInfoLayout {
        self.shared.layout
    }

    /// Current session handle; -1 once closed
    pub async fn session_handle(&self) -> i32 {
        let inner = self.shared.inner.lock().await;
        if self.is_closed() {
            return -1;
        }
        inner.session_handle
    }

    /// Start of the current transaction, if [`begin`](Self::begin) was called
    pub async fn transaction_start(&self) -> Option<DateTime<Local>> {
        self.shared.inner.lock().await.tr_start
    }

    /// Whether the server reported an open transaction in its last reply
    pub async fn in_transaction(&self) -> bool {
        let inner = self.shared.inner.lock().await;
        !self.is_closed() && inner.server_transaction
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a transaction
    ///
    /// No request is sent: the server starts a transaction implicitly with
    /// the next statement. The returned handle ends it with
    /// [`Transaction::commit`] or [`Transaction::rollback`]. A session has
    /// one transaction at a time; calling `begin` again restarts the clock.
    pub async fn begin(&self) -> Result<Transaction> {
        self.ensure_open()?;
        let mut inner = self.shared.inner.lock().await;
        if self.is_closed() {
            return Err(Error::BadConnection);
        }
        inner.tr_start = Some(Local::now());
        Ok(Transaction { conn: self.clone() })
    }

    /// Commit the current transaction.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use cubrid_rs::{Connection, Value};
    /// # async fn example(conn: Connection) -> cubrid_rs::Result<()> {
    /// let mut stmt = conn.prepare("INSERT INTO users (name) VALUES (?)").await?;
    /// stmt.exec(&["Alice".into()]).await?;
    /// stmt.exec(&["Bob".into()]).await?;
    /// conn.commit().await?; // Both inserts are now permanent
    /// # Ok(())
    /// # }
    /// ```
    pub async fn commit(&self) -> Result<()> {
        self.end_transaction(tran_type::COMMIT).await
    }

    /// Rollback the current transaction.
    pub async fn rollback(&self) -> Result<()> {
        self.end_transaction(tran_type::ROLLBACK).await
    }

    async fn end_transaction(&self, kind: u8) -> Result<()> {
        let request = EndTranMessage::new(kind).build_request()?;
        let mut inner = self.shared.inner.lock().await;
        self.exchange_locked(&mut inner, request).await?;
        inner.tr_start = None;
        tracing::trace!(id = self.id(), kind, "transaction ended");
        Ok(())
    }

    /// Ping the server to check if the session is still alive.
    ///
    /// ```rust,no_run
    /// # use cubrid_rs::Connection;
    /// # async fn example(conn: Connection) -> cubrid_rs::Result<()> {
    /// if conn.ping().await.is_ok() {
    ///     println!("Connection is alive");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn ping(&self) -> Result<()> {
        let request = SimpleFunctionMessage::new(FunctionCode::CheckCas).build_request()?;
        self.exchange(request).await?;
        Ok(())
    }

    /// Close the connection.
    ///
    /// Sends CON_CLOSE and releases the transport. Closing an already closed
    /// connection fails with [`Error::BadConnection`]. If the server rejects
    /// the request the session stays open.
    pub async fn close(&self) -> Result<()> {
        let request = SimpleFunctionMessage::new(FunctionCode::ConClose).build_request()?;
        let mut inner = self.shared.inner.lock().await;
        self.exchange_locked(&mut inner, request).await?;

        if let Err(e) = inner.transport.close().await {
            tracing::warn!(id = self.id(), error = %e, "error closing transport");
        }
        inner.session_handle = -1;
        inner.tr_start = None;
        self.shared.closed.store(true, Ordering::Release);
        tracing::debug!(id = self.id(), "connection closed");
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Prepare a statement
    ///
    /// If the server cannot report the statement's parameter count the
    /// statement is still returned, inside
    /// [`Error::ParamCountUnavailable`]:
    ///
    /// ```rust,no_run
    /// # async fn example(conn: cubrid_rs::Connection) -> cubrid_rs::Result<()> {
    /// let stmt = match conn.prepare("CALL proc(?)").await {
    ///     Ok(stmt) => stmt,
    ///     Err(e) => match e.into_statement() {
    ///         Some(stmt) => stmt,
    ///         None => return Ok(()),
    ///     },
    /// };
    /// # Ok(())
    /// # }
    /// ```
    pub async fn prepare(&self, sql: &str) -> Result<Statement> {
        let request = PrepareMessage::new(sql, self.shared.config.auto_commit).build_request()?;
        let response = self.exchange(request).await?;
        let reply = PrepareReply::parse(response, self.shared.layout)?;
        tracing::trace!(
            id = self.id(),
            handle = reply.handle,
            columns = reply.columns.len(),
            binds = reply.bind_count,
            "statement prepared"
        );

        let bind_count = reply.bind_count;
        let statement = Statement::new(self.clone(), sql, reply);
        if bind_count < 0 {
            tracing::warn!(
                id = self.id(),
                code = bind_count,
                "parameter count unavailable for prepared statement"
            );
            return Err(Error::ParamCountUnavailable {
                code: bind_count,
                statement: Box::new(statement),
            });
        }
        Ok(statement)
    }

    pub(crate) async fn execute_handle(
        &self,
        handle: i32,
        flag: u8,
        binds: &[BindValue],
    ) -> Result<i64> {
        let request = ExecuteMessage::new(handle, self.shared.config.auto_commit)
            .with_flag(flag)
            .with_binds(binds)
            .build_request()?;
        let response = self.exchange(request).await?;
        Ok(ExecuteReply::parse(response)?.result_count)
    }

    /// Fetch a batch; an exhausted result set yields an empty batch
    pub(crate) async fn fetch(
        &self,
        handle: i32,
        position: i32,
        fetch_size: u32,
        column_count: usize,
    ) -> Result<Vec<RawTuple>> {
        let request = FetchMessage::new(handle, position, fetch_size).build_request()?;
        match self.exchange(request).await {
            Ok(response) => parse_fetch_reply(response, column_count),
            Err(e) if e.is_no_more_data() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn close_req_handle(&self, handle: i32) -> Result<()> {
        let request = CloseReqHandleMessage::new(handle).build_request()?;
        self.exchange(request).await?;
        Ok(())
    }

    /// Id generated by the last INSERT on this session, if any
    pub async fn last_insert_id(&self) -> Result<Option<i64>> {
        let request = SimpleFunctionMessage::new(FunctionCode::GetLastInsertId).build_request()?;
        let response = self.exchange(request).await?;
        parse_last_insert_id(response)
    }

    // =========================================================================
    // LOBs
    // =========================================================================

    /// Create an empty LOB on the server
    pub async fn create_lob(&self, lob_type: CubridType) -> Result<LobHandle> {
        let request = LobOpMessage::new_create(lob_type).build_request()?;
        let response = self.exchange(request).await?;
        parse_lob_new_reply(response)
    }

    /// Create a LOB holding `data`
    ///
    /// The data is written in chunks of [`Config::lob_chunk_size`] bytes.
    pub async fn write_lob(&self, lob_type: CubridType, data: &[u8]) -> Result<LobHandle> {
        let mut handle = self.create_lob(lob_type).await?;
        let mut offset = 0u64;
        for chunk in data.chunks(self.shared.config.lob_chunk_size.max(1)) {
            let request = LobOpMessage::new_write(&handle, offset, chunk).build_request()?;
            let written = self.exchange(request).await?.code as usize;
            if written != chunk.len() {
                return Err(Error::Protocol(format!(
                    "short LOB write: {} of {} bytes at offset {}",
                    written,
                    chunk.len(),
                    offset
                )));
            }
            offset += chunk.len() as u64;
        }
        handle.set_size(offset);
        tracing::trace!(id = self.id(), size = offset, "LOB written");
        Ok(handle)
    }

    /// Read the full contents of a LOB
    ///
    /// Fails with [`Error::OversizeObject`] rather than truncating when the
    /// LOB exceeds [`Config::max_lob_size`].
    pub async fn read_lob(&self, handle: &LobHandle) -> Result<Vec<u8>> {
        if let Some(limit) = self.shared.config.max_lob_size {
            if handle.size() > limit {
                return Err(Error::OversizeObject {
                    size: handle.size(),
                    limit,
                });
            }
        }
        self.lob_stream(handle.clone()).read_to_end().await
    }

    /// Stream the contents of a LOB chunk by chunk
    pub fn lob_stream(&self, handle: LobHandle) -> LobStream {
        LobStream::new(self.clone(), handle, self.shared.config.lob_chunk_size)
    }

    pub(crate) async fn read_lob_chunk(
        &self,
        handle: &LobHandle,
        offset: u64,
        length: u32,
    ) -> Result<Bytes> {
        let request = LobOpMessage::new_read(handle, offset, length).build_request()?;
        let response = self.exchange(request).await?;
        parse_lob_read_reply(response)
    }

    // =========================================================================
    // Exchange
    // =========================================================================

    /// Fail fast with [`Error::BadConnection`] once the session is closed
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::BadConnection);
        }
        Ok(())
    }

    async fn exchange(&self, request: Bytes) -> Result<Response> {
        let mut inner = self.shared.inner.lock().await;
        self.exchange_locked(&mut inner, request).await
    }

    /// One request/response round trip under the session lock
    async fn exchange_locked(
        &self,
        inner: &mut ConnectionInner,
        request: Bytes,
    ) -> Result<Response> {
        if inner.in_flight {
            tracing::warn!(id = self.id(), "previous request abandoned, closing session");
            self.abandon_session(inner).await;
            return Err(Error::BadConnection);
        }
        self.ensure_open()?;
        if !inner.transport.is_connected() {
            tracing::warn!(id = self.id(), "transport disconnected, closing session");
            self.abandon_session(inner).await;
            return Err(Error::BadConnection);
        }

        let frame = Packet::frame(inner.cas_info, &request);
        tracing::trace!(
            id = self.id(),
            function = request.first().copied().unwrap_or_default(),
            len = request.len(),
            "sending request"
        );

        inner.in_flight = true;
        let guard = InFlight::new(&self.shared.closed);
        let outcome = match self.shared.config.query_timeout {
            Some(limit) => tokio::time::timeout(limit, inner.transport.round_trip(&frame))
                .await
                .map_err(|_| limit),
            None => Ok(inner.transport.round_trip(&frame).await),
        };
        guard.complete();
        inner.in_flight = false;

        let packet = match outcome {
            Ok(Ok(packet)) => packet,
            Ok(Err(e)) => {
                if matches!(e, Error::Io(_) | Error::ConnectionClosed | Error::Protocol(_)) {
                    tracing::warn!(id = self.id(), error = %e, "transport failed, closing session");
                    self.abandon_session(inner).await;
                }
                return Err(e);
            }
            Err(limit) => {
                tracing::warn!(id = self.id(), ?limit, "request timed out, closing session");
                self.abandon_session(inner).await;
                return Err(Error::Timeout(limit));
            }
        };

        inner.cas_info = packet.header.cas_info;
        inner.server_transaction = packet.header.transaction_active();
        Response::from_packet(packet)
    }

    async fn abandon_session(&self, inner: &mut ConnectionInner) {
        let _ = inner.transport.close().await;
        inner.session_handle = -1;
        inner.tr_start = None;
        inner.server_transaction = false;
        inner.in_flight = false;
        self.shared.closed.store(true, Ordering::Release);
    }
}

/// Closes the session if dropped before [`complete`](Self::complete)
///
/// A request future dropped between sending and reading its reply leaves the
/// reply on the wire; nothing else may use the session after that.
struct InFlight<'a> {
    closed: &'a AtomicBool,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(closed: &'a AtomicBool) -> Self {
        Self { closed, armed: true }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("request dropped before its reply was read");
            self.closed.store(true, Ordering::Release);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("config", &self.shared.config.to_string())
            .field("protocol_version", &self.shared.server_info.protocol_version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle for the transaction started by [`Connection::begin`]
///
/// Ending the transaction consumes the handle. Dropping it without ending it
/// leaves the transaction open on the session.
#[derive(Debug, Clone)]
pub struct Transaction {
    conn: Connection,
}

impl Transaction {
    /// The connection the transaction runs on
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Commit the transaction
    pub async fn commit(self) -> Result<()> {
        self.conn.commit().await
    }

    /// Roll the transaction back
    pub async fn rollback(self) -> Result<()> {
        self.conn.rollback().await
    }
}
