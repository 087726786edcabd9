//! TCP transport implementation

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{Error, Result};

use super::Transport;

/// TCP transport for broker connections
pub struct TcpTransport {
    /// The underlying TCP stream
    stream: Option<TcpStream>,
    /// Host used for the initial connect and broker redirects
    host: String,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a new TCP transport (not yet connected)
    pub fn new() -> Self {
        Self {
            stream: None,
            host: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect to `host:port`
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout(self.connect_timeout))?
            .map_err(Error::Io)?;

        stream.set_nodelay(true).map_err(Error::Io)?;
        tracing::debug!(addr = %addr, "tcp connection established");

        self.host = host.to_string();
        self.stream = Some(stream);
        Ok(())
    }

    /// Connect using a Config
    pub async fn connect_with_config(&mut self, config: &Config) -> Result<()> {
        self.connect_timeout = config.connect_timeout;
        self.connect(&config.host, config.port).await
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.write_all(data).await.map_err(Error::Io)?;
        stream.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    async fn receive_exact(&mut self, len: usize) -> Result<Bytes> {
        let stream = self.stream_mut()?;

        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::ConnectionClosed
            } else {
                Error::Io(e)
            }
        })?;

        Ok(Bytes::from(buf))
    }

    async fn reconnect(&mut self, port: u16) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        let host = self.host.clone();
        self.connect(&host, port).await
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(Error::Io)?;
        }
        Ok(())
    }
}
