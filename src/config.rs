//! Connection configuration and connection URL parsing
//!
//! Connection URLs follow the broker format:
//!
//! ```text
//! cci:CUBRID:<host>:<port>:<db_name>:<user>:<password>:[?<property>=<value>[&...]]
//! ```
//!
//! Recognized properties (names are case-insensitive, `_` optional):
//!
//! - `login_timeout`: handshake deadline in milliseconds
//! - `query_timeout`: per-request deadline in milliseconds (0 = none)
//! - `fetch_size`: rows requested per FETCH
//! - `lob_chunk_size`: bytes requested per LOB read or write
//! - `max_lob_size`: refuse to materialize larger LOBs
//! - `autocommit`: commit after every statement
//!
//! Anything else is forwarded to the broker untouched.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_FETCH_SIZE, DEFAULT_LOB_CHUNK_SIZE, DEFAULT_PORT};
use crate::error::{Error, Result};

/// URL scheme prefix
pub const URL_PREFIX: &str = "cci:CUBRID:";

/// Default handshake deadline
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration
///
/// # Example
///
/// ```rust
/// use cubrid_rs::Config;
/// use std::time::Duration;
///
/// let config = Config::new("localhost", 33000, "demodb", "dba", "")
///     .query_timeout(Duration::from_secs(5))
///     .fetch_size(500);
/// assert_eq!(config.fetch_size, 500);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    password: String,
    /// Handshake deadline
    pub connect_timeout: Duration,
    /// Deadline for every request after the handshake; expiry closes the session
    pub query_timeout: Option<Duration>,
    /// Rows requested per FETCH
    pub fetch_size: u32,
    /// Bytes requested per LOB read or write
    pub lob_chunk_size: usize,
    /// Largest LOB that will be read into memory
    pub max_lob_size: Option<u64>,
    /// Commit after every statement
    pub auto_commit: bool,
    /// Unrecognized URL properties, forwarded to the broker
    pub extra_properties: Vec<(String, String)>,
}

impl Config {
    /// Create a new configuration
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the handshake deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-request deadline
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the number of rows requested per FETCH
    pub fn fetch_size(mut self, size: u32) -> Self {
        self.fetch_size = size;
        self
    }

    /// Set the LOB transfer chunk size
    pub fn lob_chunk_size(mut self, size: usize) -> Self {
        self.lob_chunk_size = size;
        self
    }

    /// Refuse to read LOBs larger than `limit` bytes
    pub fn max_lob_size(mut self, limit: u64) -> Self {
        self.max_lob_size = Some(limit);
        self
    }

    /// Enable or disable auto-commit
    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    /// Get the password (for authentication)
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Set the password
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Set the username
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Properties forwarded to the broker, in `key=value&...` form
    pub fn url_extension(&self) -> String {
        self.extra_properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn apply_property(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = key.to_ascii_lowercase().replace('_', "");
        match normalized.as_str() {
            "logintimeout" => self.connect_timeout = Duration::from_millis(parse_number(key, value)?),
            "querytimeout" => {
                let ms = parse_number(key, value)?;
                self.query_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            "fetchsize" => {
                self.fetch_size = u32::try_from(parse_number(key, value)?)
                    .map_err(|_| invalid_property(key, value))?
            }
            "lobchunksize" => {
                let size = usize::try_from(parse_number(key, value)?)
                    .map_err(|_| invalid_property(key, value))?;
                if size == 0 {
                    return Err(invalid_property(key, value));
                }
                self.lob_chunk_size = size;
            }
            "maxlobsize" => self.max_lob_size = Some(parse_number(key, value)?),
            "autocommit" => self.auto_commit = parse_bool(key, value)?,
            _ => self
                .extra_properties
                .push((key.to_string(), value.to_string())),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            connect_timeout: DEFAULT_LOGIN_TIMEOUT,
            query_timeout: None,
            fetch_size: DEFAULT_FETCH_SIZE,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            max_lob_size: None,
            auto_commit: false,
            extra_properties: Vec::new(),
        }
    }
}

fn invalid_property(key: &str, value: &str) -> Error {
    Error::InvalidConnectionString(format!("invalid value {:?} for property {}", value, key))
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| invalid_property(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid_property(key, value)),
    }
}

/// Parse a `cci:CUBRID:` connection URL
impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let prefix_ok = s
            .get(..URL_PREFIX.len())
            .map_or(false, |p| p.eq_ignore_ascii_case(URL_PREFIX));
        if !prefix_ok {
            return Err(Error::InvalidConnectionString(format!(
                "connection URL must start with {}",
                URL_PREFIX
            )));
        }
        let rest = &s[URL_PREFIX.len()..];

        let (main, props) = match rest.split_once('?') {
            Some((main, props)) => (main, Some(props)),
            None => (rest, None),
        };
        let main = main.strip_suffix(':').unwrap_or(main);
        let parts: Vec<&str> = main.split(':').collect();
        if parts.len() < 3 || parts.len() > 5 {
            return Err(Error::InvalidConnectionString(
                "expected host:port:db_name[:user[:password]]".to_string(),
            ));
        }

        let mut config = Config::default();
        if parts[0].is_empty() {
            return Err(Error::InvalidConnectionString("missing host".to_string()));
        }
        config.host = parts[0].to_string();
        if !parts[1].is_empty() {
            config.port = parts[1]
                .parse()
                .map_err(|_| Error::InvalidConnectionString("invalid port number".to_string()))?;
        }
        if parts[2].is_empty() {
            return Err(Error::InvalidConnectionString(
                "missing database name".to_string(),
            ));
        }
        config.database = parts[2].to_string();
        config.username = parts.get(3).copied().unwrap_or_default().to_string();
        config.password = parts.get(4).copied().unwrap_or_default().to_string();

        for pair in props.into_iter().flat_map(|p| p.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidConnectionString(format!("property {:?} has no value", pair))
            })?;
            config.apply_property(key.trim(), value)?;
        }

        Ok(config)
    }
}

/// Renders the URL with the password masked
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "********" };
        write!(
            f,
            "{}{}:{}:{}:{}:{}:",
            URL_PREFIX, self.host, self.port, self.database, self.username, password
        )
    }
}
