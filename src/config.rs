use std::{env, path::PathBuf};

use crate::{
    channel::DEFAULT_HEADER_LEN,
    error::{ClientErr, Result},
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// Connection and persistence settings for a round client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub header_len: usize,
    pub host: String,
    pub port: u16,
    pub weights_path: PathBuf,
}

impl ClientConfig {
    /// Creates a new client configuration with default network settings.
    ///
    /// # Args
    /// * `weights_path` - Where every received state is persisted.
    ///
    /// # Returns
    /// A `ClientConfig` instance.
    pub fn new(weights_path: impl Into<PathBuf>) -> Self {
        Self {
            header_len: DEFAULT_HEADER_LEN,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            weights_path: weights_path.into(),
        }
    }

    /// Creates a configuration from the `HOST`, `PORT` and `HEADER_LENGTH`
    /// environment variables, falling back to the defaults for unset ones.
    ///
    /// # Errors
    /// `ClientErr::InvalidConfig` if a set variable does not parse.
    pub fn from_env(weights_path: impl Into<PathBuf>) -> Result<Self> {
        let mut cfg = Self::new(weights_path);

        if let Ok(host) = env::var("HOST") {
            cfg.host = host;
        }

        if let Ok(port) = env::var("PORT") {
            cfg.port = port
                .parse()
                .map_err(|e| ClientErr::InvalidConfig(format!("PORT={port:?}: {e}")))?;
        }

        if let Ok(len) = env::var("HEADER_LENGTH") {
            cfg.header_len = len
                .parse()
                .map_err(|e| ClientErr::InvalidConfig(format!("HEADER_LENGTH={len:?}: {e}")))?;
        }

        Ok(cfg)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_header_len(mut self, header_len: usize) -> Self {
        self.header_len = header_len;
        self
    }

    /// The coordinator address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks the settings before any connection is attempted.
    ///
    /// # Errors
    /// `ClientErr::InvalidConfig` on a zero header width or an empty host.
    pub fn validate(&self) -> Result<()> {
        if self.header_len == 0 {
            return Err(ClientErr::InvalidConfig(
                "header length must be at least one byte".into(),
            ));
        }

        if self.host.trim().is_empty() {
            return Err(ClientErr::InvalidConfig("host must not be empty".into()));
        }

        Ok(())
    }
}
