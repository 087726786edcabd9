//! Driver entry points
//!
//! [`CubridDriver`] opens connections from URLs; a [`Connector`] holds a
//! parsed configuration and opens any number of connections from it. The
//! driver is registered once per process under the name `"cubrid"` and can
//! be looked up by that name.

use std::sync::OnceLock;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;

/// Name the driver is registered under
pub const DRIVER_NAME: &str = "cubrid";

static REGISTERED: OnceLock<CubridDriver> = OnceLock::new();

/// The CUBRID driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CubridDriver;

impl CubridDriver {
    /// Open a new connection from a `cci:CUBRID:` URL
    pub async fn open(&self, url: &str) -> Result<Connection> {
        self.open_connector(url)?.connect().await
    }

    /// Parse a URL into a reusable [`Connector`] without connecting
    pub fn open_connector(&self, url: &str) -> Result<Connector> {
        Ok(Connector {
            config: url.parse()?,
        })
    }

    /// Name the driver is registered under
    pub fn name(&self) -> &'static str {
        DRIVER_NAME
    }
}

/// Register the driver; later calls return the same instance
pub fn register() -> &'static CubridDriver {
    REGISTERED.get_or_init(|| {
        tracing::debug!(name = DRIVER_NAME, "driver registered");
        CubridDriver
    })
}

/// Look up a registered driver by name
pub fn lookup(name: &str) -> Option<&'static CubridDriver> {
    if name == DRIVER_NAME {
        REGISTERED.get()
    } else {
        None
    }
}

/// Opens connections from a fixed configuration
#[derive(Debug, Clone)]
pub struct Connector {
    config: Config,
}

impl Connector {
    /// Create a connector from a configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The configuration connections are opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a new connection
    pub async fn connect(&self) -> Result<Connection> {
        Connection::connect_with_config(self.config.clone()).await
    }

    /// The driver this connector belongs to
    pub fn driver(&self) -> CubridDriver {
        CubridDriver
    }
}
