//! Server configuration

use crate::error::{Error, Result};
use crate::server::DEFAULT_ADDR;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub transcript: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads from `.env` if present. All variables are optional:
    /// - `IMAPD_ADDR` (default: `0.0.0.0:143`)
    /// - `IMAPD_TRANSCRIPT` -- protocol transcript file path
    ///   (default: discard)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let addr = env::var("IMAPD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        addr.parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("Invalid IMAPD_ADDR {addr:?}: {e}")))?;

        Ok(Self {
            addr,
            transcript: env::var("IMAPD_TRANSCRIPT").ok().map(PathBuf::from),
        })
    }
}
