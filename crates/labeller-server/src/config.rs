//! Server configuration.
//!
//! Everything is read from environment variables with defaults suitable for
//! a single local instance.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use thiserror::Error;

/// Default number of contexts served per batch.
pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => panic!("default page size is zero"),
};

/// Configuration for the checkpoint protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Maximum contexts returned by one `get_next_batch` call.
    pub page_size: NonZeroUsize,
}

impl ProtocolConfig {
    /// Config with the given page size, or `None` for zero.
    pub fn with_page_size(page_size: usize) -> Option<Self> {
        NonZeroUsize::new(page_size).map(|page_size| Self { page_size })
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Configuration for the server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// SQLite database file.
    pub database: PathBuf,
    /// Hex-encoded 32-byte credential signing seed. A random key is
    /// generated when absent, which invalidates credentials on restart.
    pub signing_seed: Option<String>,
    /// JSON array of context strings used to seed an empty contexts table.
    pub contexts_file: Option<PathBuf>,
    pub protocol: ProtocolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database: PathBuf::from("labelling_database.sdb"),
            signing_seed: None,
            contexts_file: None,
            protocol: ProtocolConfig::default(),
        }
    }
}

/// Errors while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `LABELLER_BIND` | listen address, e.g. `127.0.0.1:8080` |
    /// | `PORT` | listen port on all interfaces, when `LABELLER_BIND` is unset |
    /// | `LABELLER_DB` | SQLite database path |
    /// | `LABELLER_PAGE_SIZE` | contexts per batch |
    /// | `LABELLER_SIGNING_SEED` | hex credential signing seed |
    /// | `LABELLER_CONTEXTS` | JSON file of contexts to seed |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("LABELLER_BIND") {
            config.bind_addr = bind.parse().map_err(|e| ConfigError::Invalid {
                var: "LABELLER_BIND",
                reason: format!("{e}"),
            })?;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: format!("{e}"),
            })?;
            config.bind_addr.set_port(port);
        }

        if let Some(db) = lookup("LABELLER_DB") {
            config.database = PathBuf::from(db);
        }

        if let Some(size) = lookup("LABELLER_PAGE_SIZE") {
            config.protocol.page_size = size.parse().map_err(|e| ConfigError::Invalid {
                var: "LABELLER_PAGE_SIZE",
                reason: format!("{e}"),
            })?;
        }

        config.signing_seed = lookup("LABELLER_SIGNING_SEED").filter(|s| !s.trim().is_empty());
        config.contexts_file = lookup("LABELLER_CONTEXTS").map(PathBuf::from);

        Ok(config)
    }
}
