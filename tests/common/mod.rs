//! In-memory CAS engine used by the integration tests
//!
//! `MockEngine` implements `Transport` and answers requests the way a broker
//! and CAS would: it runs the handshake, keeps prepared statements, result
//! rows and LOB contents in memory, and records every request so tests can
//! assert on what went over the wire. Clones share state, so a test keeps
//! one clone for inspection and hands another to the connection.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cubrid_rs::buffer::{ReadBuffer, WriteBuffer};
use cubrid_rs::constants::{error_code, handshake, CubridType, FunctionCode, OID_SIZE};
use cubrid_rs::{Config, Connection, Error, Result, Transport};

pub const CAS_PID: i32 = 4242;
/// CAS info of session replies while no transaction is open
pub const SESSION_CAS_INFO: [u8; 4] = [0, 0xff, 0xff, 0x7f];

const STMT_SELECT: u8 = 21;
const STMT_INSERT: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ClientInfo,
    OpenDatabase,
    Session,
}

#[derive(Debug, Clone)]
struct MockStatement {
    columns: Vec<(String, CubridType)>,
    bind_count: i32,
    stmt_type: u8,
    rows: Vec<Vec<Option<Vec<u8>>>>,
    affected: i32,
    echo: bool,
}

#[derive(Debug, Clone)]
struct Prepared {
    statement: MockStatement,
    rows: Vec<Vec<Option<Vec<u8>>>>,
}

/// A parameter as received by EXECUTE
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedBind {
    pub type_code: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct EngineState {
    stage: Option<Stage>,
    outbox: VecDeque<u8>,
    protocol_version: u8,
    redirect_port: Option<u16>,
    reconnected_to: Option<u16>,
    refuse_code: Option<i32>,
    login_error: Option<(i32, String)>,
    open_request: Option<(String, String, String, String)>,

    statements: HashMap<String, MockStatement>,
    prepared: HashMap<i32, Prepared>,
    next_handle: i32,

    lobs: HashMap<Vec<u8>, Vec<u8>>,
    next_lob: u32,
    lob_read_cap: Option<usize>,
    short_lob_read: bool,

    last_insert_id: Option<String>,
    failures: HashMap<u8, (i32, String)>,
    stall_on: Option<u8>,
    stalled: bool,
    delay_on: Option<(u8, Duration)>,
    pending_delay: Option<Duration>,
    transaction_open: bool,
    severed: bool,
    drop_on: Option<u8>,
    broken: bool,
    closed: bool,

    requests: Vec<u8>,
    cas_info_seen: Vec<[u8; 4]>,
    last_binds: Vec<ReceivedBind>,
    fetch_positions: Vec<(i32, i32)>,
    end_trans: Vec<u8>,
    closed_handles: Vec<i32>,
    lob_writes: usize,
    lob_reads: usize,
}

/// In-memory engine; clones share state
#[derive(Debug, Clone)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        let state = EngineState {
            stage: Some(Stage::ClientInfo),
            protocol_version: handshake::PROTOCOL_VERSION,
            next_handle: 1,
            last_insert_id: Some(String::new()),
            ..EngineState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    // =========================================================================
    // Setup
    // =========================================================================

    pub fn set_protocol_version(&self, version: u8) {
        self.with(|s| s.protocol_version = version);
    }

    pub fn redirect_to(&self, port: u16) {
        self.with(|s| s.redirect_port = Some(port));
    }

    pub fn refuse_with(&self, code: i32) {
        self.with(|s| s.refuse_code = Some(code));
    }

    pub fn fail_login(&self, code: i32, message: &str) {
        self.with(|s| s.login_error = Some((code, message.to_string())));
    }

    /// Register a query with fixed result rows (raw cell text, `None` = NULL)
    pub fn register_query(
        &self,
        sql: &str,
        columns: &[(&str, CubridType)],
        bind_count: i32,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    ) {
        let statement = MockStatement {
            columns: columns.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
            bind_count,
            stmt_type: STMT_SELECT,
            rows,
            affected: 0,
            echo: false,
        };
        self.with(|s| s.statements.insert(sql.to_string(), statement));
    }

    /// Register a query whose single result row echoes its parameters
    pub fn register_echo(&self, sql: &str, columns: &[(&str, CubridType)]) {
        let statement = MockStatement {
            columns: columns.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
            bind_count: columns.len() as i32,
            stmt_type: STMT_SELECT,
            rows: Vec::new(),
            affected: 0,
            echo: true,
        };
        self.with(|s| s.statements.insert(sql.to_string(), statement));
    }

    /// Register a non-query statement
    pub fn register_dml(&self, sql: &str, bind_count: i32, affected: i32) {
        let statement = MockStatement {
            columns: Vec::new(),
            bind_count,
            stmt_type: STMT_INSERT,
            rows: Vec::new(),
            affected,
            echo: false,
        };
        self.with(|s| s.statements.insert(sql.to_string(), statement));
    }

    /// Text returned by GET_LAST_INSERT_ID; `None` makes the lookup fail
    pub fn set_last_insert_id(&self, id: Option<&str>) {
        self.with(|s| s.last_insert_id = id.map(String::from));
    }

    /// Answer every request of `function` with an engine error
    pub fn fail_function(&self, function: FunctionCode, code: i32, message: &str) {
        self.with(|s| {
            s.failures
                .insert(function as u8, (code, message.to_string()))
        });
    }

    pub fn clear_failure(&self, function: FunctionCode) {
        self.with(|s| s.failures.remove(&(function as u8)));
    }

    /// Never answer requests of `function`
    pub fn stall_on(&self, function: FunctionCode) {
        self.with(|s| s.stall_on = Some(function as u8));
    }

    /// Hold back the reply to `function` for `delay`
    pub fn delay_reply_on(&self, function: FunctionCode, delay: Duration) {
        self.with(|s| s.delay_on = Some((function as u8, delay)));
    }

    /// Report the transport as disconnected without any I/O error
    pub fn sever(&self) {
        self.with(|s| s.severed = true);
    }

    /// Drop the socket instead of answering `function`
    pub fn drop_connection_on(&self, function: FunctionCode) {
        self.with(|s| s.drop_on = Some(function as u8));
    }

    /// Return at most `cap` bytes per LOB_READ
    pub fn cap_lob_reads(&self, cap: usize) {
        self.with(|s| s.lob_read_cap = Some(cap));
    }

    /// Answer LOB_READ with zero bytes
    pub fn short_lob_reads(&self) {
        self.with(|s| s.short_lob_read = true);
    }

    /// Store a LOB and return its serialized handle, ready for a result cell
    pub fn insert_lob(&self, lob_type: CubridType, data: &[u8]) -> Vec<u8> {
        self.with(|s| {
            let locator = s.new_locator();
            s.lobs.insert(locator.clone(), data.to_vec());
            handle_bytes(lob_type, data.len() as i64, &locator)
        })
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Function codes received after the handshake, in order
    pub fn requests(&self) -> Vec<u8> {
        self.with(|s| s.requests.clone())
    }

    pub fn count(&self, function: FunctionCode) -> usize {
        self.with(|s| s.requests.iter().filter(|&&f| f == function as u8).count())
    }

    pub fn open_request(&self) -> Option<(String, String, String, String)> {
        self.with(|s| s.open_request.clone())
    }

    pub fn reconnected_to(&self) -> Option<u16> {
        self.with(|s| s.reconnected_to)
    }

    pub fn is_closed(&self) -> bool {
        self.with(|s| s.closed)
    }

    pub fn cas_info_seen(&self) -> Vec<[u8; 4]> {
        self.with(|s| s.cas_info_seen.clone())
    }

    pub fn last_binds(&self) -> Vec<ReceivedBind> {
        self.with(|s| s.last_binds.clone())
    }

    /// (position, fetch size) of every FETCH
    pub fn fetch_positions(&self) -> Vec<(i32, i32)> {
        self.with(|s| s.fetch_positions.clone())
    }

    pub fn end_trans(&self) -> Vec<u8> {
        self.with(|s| s.end_trans.clone())
    }

    pub fn closed_handles(&self) -> Vec<i32> {
        self.with(|s| s.closed_handles.clone())
    }

    pub fn open_statements(&self) -> usize {
        self.with(|s| s.prepared.len())
    }

    pub fn lob_contents(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.lobs.values().cloned().collect())
    }

    pub fn lob_writes(&self) -> usize {
        self.with(|s| s.lob_writes)
    }

    pub fn lob_reads(&self) -> usize {
        self.with(|s| s.lob_reads)
    }
}

/// Open a connection against `engine` with `config`
pub async fn connect_with(engine: &MockEngine, config: Config) -> Result<Connection> {
    Connection::connect_with_transport(engine.clone(), config).await
}

/// Open a connection against `engine` with a default configuration
pub async fn connect(engine: &MockEngine) -> Connection {
    connect_with(engine, test_config()).await.unwrap()
}

pub fn test_config() -> Config {
    Config::new("localhost", 33000, "demodb", "dba", "secret")
}

pub fn cell(text: &str) -> Option<Vec<u8>> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    Some(bytes)
}

fn handle_bytes(lob_type: CubridType, size: i64, locator: &[u8]) -> Vec<u8> {
    let mut buf = WriteBuffer::new();
    buf.write_i32_be(lob_type.code() as i32);
    buf.write_i64_be(size);
    buf.write_i32_be(locator.len() as i32);
    buf.write_bytes(locator);
    buf.as_slice().to_vec()
}

fn parse_handle(raw: &[u8]) -> (CubridType, Vec<u8>) {
    let mut buf = ReadBuffer::from_slice(raw);
    let code = buf.read_i32_be().unwrap();
    let _size = buf.read_i64_be().unwrap();
    let len = buf.read_i32_be().unwrap();
    (
        CubridType::from(code as u8),
        buf.read_bytes_vec(len as usize).unwrap(),
    )
}

fn arg_i32(arg: &[u8]) -> i32 {
    i32::from_be_bytes(arg[..4].try_into().unwrap())
}

fn arg_i64(arg: &[u8]) -> i64 {
    i64::from_be_bytes(arg[..8].try_into().unwrap())
}

impl EngineState {
    fn new_locator(&mut self) -> Vec<u8> {
        self.next_lob += 1;
        format!("file:/cubrid/lob/ces_{:03}\0", self.next_lob).into_bytes()
    }

    fn push_raw(&mut self, bytes: &[u8]) {
        self.outbox.extend(bytes.iter().copied());
    }

    fn push_frame(&mut self, cas_info: [u8; 4], payload: &[u8]) {
        let mut buf = WriteBuffer::new();
        buf.write_u32_be(payload.len() as u32);
        buf.write_bytes(&cas_info);
        buf.write_bytes(payload);
        self.push_raw(buf.as_slice());
    }

    fn session_cas_info(&self) -> [u8; 4] {
        let mut cas_info = SESSION_CAS_INFO;
        cas_info[0] = self.transaction_open as u8;
        cas_info
    }

    fn push_ok(&mut self, code: i32, body: &[u8]) {
        let mut buf = WriteBuffer::new();
        buf.write_i32_be(code);
        buf.write_bytes(body);
        self.push_frame(self.session_cas_info(), buf.as_slice());
    }

    fn push_error(&mut self, engine_code: i32, message: &str) {
        let mut buf = WriteBuffer::new();
        buf.write_i32_be(-1);
        buf.write_i32_be(engine_code);
        buf.write_bytes(message.as_bytes());
        buf.write_u8(0);
        self.push_frame(self.session_cas_info(), buf.as_slice());
    }

    fn handle_client_info(&mut self, data: &[u8]) {
        assert_eq!(data.len(), handshake::CLIENT_INFO_SIZE);
        assert_eq!(&data[..5], handshake::MAGIC);
        if let Some(code) = self.refuse_code {
            self.push_raw(&code.to_be_bytes());
            return;
        }
        let port = self.redirect_port.map(i32::from).unwrap_or(0);
        self.push_raw(&port.to_be_bytes());
        self.stage = Some(Stage::OpenDatabase);
    }

    fn handle_open_database(&mut self, data: &[u8]) {
        assert_eq!(data.len(), handshake::OPEN_DATABASE_SIZE);
        let mut buf = ReadBuffer::from_slice(data);
        let db = buf.read_fixed_string(handshake::DB_NAME_SIZE).unwrap();
        let user = buf.read_fixed_string(handshake::DB_USER_SIZE).unwrap();
        let password = buf.read_fixed_string(handshake::DB_PASSWORD_SIZE).unwrap();
        let ext = buf.read_fixed_string(handshake::URL_EXTENSION_SIZE).unwrap();
        self.open_request = Some((db, user, password, ext));

        if let Some((code, message)) = self.login_error.clone() {
            self.push_error(code, &message);
            return;
        }

        let mut body = WriteBuffer::new();
        body.write_i32_be(CAS_PID);
        body.write_bytes(&[0, 0, 0, 0, handshake::VERSION_FLAG | self.protocol_version, 0, 0, 0]);
        body.write_bytes(&[7u8; 20]);
        self.push_frame([0, 0xff, 0xff, 0xff], body.as_slice());
        self.stage = Some(Stage::Session);
    }

    fn handle_request(&mut self, data: &[u8]) {
        let mut buf = ReadBuffer::from_slice(data);
        let _len = buf.read_u32_be().unwrap();
        let cas_info = buf.read_array::<4>().unwrap();
        self.cas_info_seen.push(cas_info);

        let function = buf.read_u8().unwrap();
        let mut args = Vec::new();
        while buf.remaining() > 0 {
            let size = buf.read_i32_be().unwrap();
            args.push(buf.read_bytes_vec(size.max(0) as usize).unwrap());
        }
        self.requests.push(function);

        if self.drop_on == Some(function) {
            self.broken = true;
            return;
        }
        if self.stall_on == Some(function) {
            self.stalled = true;
            return;
        }
        if let Some((_, delay)) = self.delay_on.filter(|(f, _)| *f == function) {
            self.pending_delay = Some(delay);
        }
        if let Some((code, message)) = self.failures.get(&function).cloned() {
            self.push_error(code, &message);
            return;
        }

        match FunctionCode::try_from(function).unwrap() {
            FunctionCode::Prepare => self.prepare(&args),
            FunctionCode::Execute => self.execute(&args),
            FunctionCode::Fetch => self.fetch(&args),
            FunctionCode::CloseReqHandle => {
                let handle = arg_i32(&args[0]);
                if self.prepared.remove(&handle).is_some() {
                    self.closed_handles.push(handle);
                    self.push_ok(0, &[]);
                } else {
                    self.push_error(error_code::REQ_HANDLE, "Invalid request handle");
                }
            }
            FunctionCode::EndTran => {
                self.end_trans.push(args[0][0]);
                self.transaction_open = false;
                self.push_ok(0, &[]);
            }
            FunctionCode::ConClose | FunctionCode::CheckCas => self.push_ok(0, &[]),
            FunctionCode::GetLastInsertId => match self.last_insert_id.clone() {
                Some(text) => {
                    let mut body = text.into_bytes();
                    body.push(0);
                    self.push_ok(0, &body);
                }
                None => self.push_error(error_code::DBMS, "last insert id not available"),
            },
            FunctionCode::LobNew => {
                let lob_type = CubridType::from(arg_i32(&args[0]) as u8);
                let locator = self.new_locator();
                self.lobs.insert(locator.clone(), Vec::new());
                self.push_ok(0, &handle_bytes(lob_type, 0, &locator));
            }
            FunctionCode::LobWrite => {
                let (_, locator) = parse_handle(&args[0]);
                let offset = arg_i64(&args[1]) as usize;
                let data = &args[2];
                self.lob_writes += 1;
                match self.lobs.get_mut(&locator) {
                    Some(lob) => {
                        if lob.len() < offset + data.len() {
                            lob.resize(offset + data.len(), 0);
                        }
                        lob[offset..offset + data.len()].copy_from_slice(data);
                        let n = data.len() as i32;
                        self.push_ok(n, &[]);
                    }
                    None => self.push_error(-1, "no such LOB"),
                }
            }
            FunctionCode::LobRead => {
                let (_, locator) = parse_handle(&args[0]);
                let offset = arg_i64(&args[1]) as usize;
                let mut length = arg_i32(&args[2]) as usize;
                self.lob_reads += 1;
                if let Some(cap) = self.lob_read_cap {
                    length = length.min(cap);
                }
                if self.short_lob_read {
                    length = 0;
                }
                match self.lobs.get(&locator).cloned() {
                    Some(lob) => {
                        let end = (offset + length).min(lob.len());
                        let start = offset.min(end);
                        let chunk = lob[start..end].to_vec();
                        self.push_ok(chunk.len() as i32, &chunk);
                    }
                    None => self.push_error(-1, "no such LOB"),
                }
            }
        }
    }

    fn prepare(&mut self, args: &[Vec<u8>]) {
        let sql = String::from_utf8(args[0][..args[0].len() - 1].to_vec()).unwrap();
        let Some(statement) = self.statements.get(&sql).cloned() else {
            self.push_error(-493, "Syntax: syntax error, unexpected IdName");
            return;
        };

        let handle = self.next_handle;
        self.next_handle += 1;
        self.prepared.insert(
            handle,
            Prepared {
                statement: statement.clone(),
                rows: statement.rows.clone(),
            },
        );

        let mut body = WriteBuffer::new();
        body.write_i32_be(0); // cache lifetime
        body.write_u8(statement.stmt_type);
        body.write_i32_be(statement.bind_count);
        body.write_u8(0);
        body.write_i32_be(statement.columns.len() as i32);
        for (name, ty) in &statement.columns {
            if self.protocol_version < handshake::PROTOCOL_V10_LAYOUT {
                body.write_i32_be(ty.code() as i32);
            } else {
                body.write_u8(ty.code());
            }
            body.write_i16_be(0);
            body.write_i32_be(0);
            body.write_string_with_length(Some(name));
            body.write_string_with_length(Some(name));
            body.write_string_with_length(Some("mock_table"));
            body.write_u8(1);
        }
        self.push_ok(handle, body.as_slice());
    }

    fn execute(&mut self, args: &[Vec<u8>]) {
        let handle = arg_i32(&args[0]);
        let binds: Vec<ReceivedBind> = args[5..]
            .chunks(2)
            .map(|pair| ReceivedBind {
                type_code: pair[0][0],
                data: pair[1].clone(),
            })
            .collect();
        self.last_binds = binds.clone();

        let Some(prepared) = self.prepared.get_mut(&handle) else {
            self.push_error(error_code::REQ_HANDLE, "Invalid request handle");
            return;
        };
        if prepared.statement.echo {
            let columns = prepared.statement.columns.clone();
            let row = binds
                .iter()
                .zip(columns.iter())
                .map(|(bind, (_, ty))| echo_cell(bind, *ty))
                .collect();
            prepared.rows = vec![row];
        }
        let count = if prepared.statement.stmt_type == STMT_SELECT {
            prepared.rows.len() as i32
        } else {
            prepared.statement.affected
        };
        self.transaction_open = true;
        self.push_ok(count, &[]);
    }

    fn fetch(&mut self, args: &[Vec<u8>]) {
        let handle = arg_i32(&args[0]);
        let position = arg_i32(&args[1]);
        let fetch_size = arg_i32(&args[2]);
        self.fetch_positions.push((position, fetch_size));

        let Some(prepared) = self.prepared.get(&handle) else {
            self.push_error(error_code::REQ_HANDLE, "Invalid request handle");
            return;
        };
        let start = (position - 1).max(0) as usize;
        if start >= prepared.rows.len() {
            self.push_error(error_code::NO_MORE_DATA, "No more data");
            return;
        }
        let end = (start + fetch_size as usize).min(prepared.rows.len());

        let mut body = WriteBuffer::new();
        body.write_i32_be((end - start) as i32);
        for (i, row) in prepared.rows[start..end].iter().enumerate() {
            body.write_i32_be((start + i + 1) as i32);
            body.write_zeros(OID_SIZE);
            for cell in row {
                match cell {
                    Some(data) => {
                        body.write_i32_be(data.len() as i32);
                        body.write_bytes(data);
                    }
                    None => body.write_i32_be(-1),
                }
            }
        }
        let body = body.as_slice().to_vec();
        self.push_ok(0, &body);
    }
}

/// Render a received parameter the way the server would render the column
fn echo_cell(bind: &ReceivedBind, column_type: CubridType) -> Option<Vec<u8>> {
    if bind.data.is_empty() {
        return None;
    }
    let text = match bind.type_code {
        t if t == CubridType::BigInt.code() => arg_i64(&bind.data).to_string(),
        t if t == CubridType::Double.code() => {
            f64::from_be_bytes(bind.data[..8].try_into().unwrap()).to_string()
        }
        t if t == CubridType::Blob.code() || t == CubridType::Clob.code() => {
            return Some(bind.data.clone());
        }
        _ => String::from_utf8(bind.data[..bind.data.len() - 1].to_vec()).unwrap(),
    };
    let text = match column_type {
        CubridType::Timestamp => text.split('.').next().unwrap().to_string(),
        _ => text,
    };
    let mut bytes = text.into_bytes();
    bytes.push(0);
    Some(bytes)
}

#[async_trait::async_trait]
impl Transport for MockEngine {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.broken {
            return Err(Error::ConnectionClosed);
        }
        match state.stage.unwrap_or(Stage::Session) {
            Stage::ClientInfo => state.handle_client_info(data),
            Stage::OpenDatabase => state.handle_open_database(data),
            Stage::Session => state.handle_request(data),
        }
        Ok(())
    }

    async fn receive_exact(&mut self, len: usize) -> Result<Bytes> {
        let delay = self.with(|s| s.pending_delay.take());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let stalled = {
            let mut state = self.state.lock().unwrap();
            if state.outbox.len() >= len {
                let bytes: Vec<u8> = state.outbox.drain(..len).collect();
                return Ok(Bytes::from(bytes));
            }
            state.stalled
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Err(Error::ConnectionClosed)
    }

    async fn reconnect(&mut self, port: u16) -> Result<()> {
        self.with(|s| s.reconnected_to = Some(port));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.with(|s| !s.closed && !s.severed)
    }

    async fn close(&mut self) -> Result<()> {
        self.with(|s| s.closed = true);
        Ok(())
    }
}
