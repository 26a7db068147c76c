//! Server configuration
//!
//! This module provides configuration options for the echo servers. Values
//! come from environment overrides with hard-coded fallbacks; once built a
//! configuration is never mutated.

use mirrorsocket_core::error::{ConfigError, Error};
use std::path::{Path, PathBuf};

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Default plain HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// Directory under the base directory holding TLS material
pub const TLS_DIR: &str = "tls";

/// Default certificate file name
pub const CERT_FILE_NAME: &str = "cert.pem";

/// Default private key file name
pub const KEY_FILE_NAME: &str = "key.pem";

/// Environment variable names
pub mod env {
    /// Bind address
    pub const ADDRESS: &str = "ADDRESS";
    /// Plain HTTP port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// HTTPS port
    pub const HTTPS_PORT: &str = "HTTPS_PORT";
    /// Certificate PEM path
    pub const CERTIFICATE_PATH: &str = "CERTIFICATE_PATH";
    /// Private key PEM path
    pub const KEY_PATH: &str = "KEY_PATH";
    /// Directory containing `public/` and `tls/`
    pub const BASE_DIR: &str = "BASE_DIR";
}

/// Which flavour of server a configuration is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    /// Plain HTTP + WS
    Plain,
    /// HTTPS + WSS
    Secure,
}

impl ServerKind {
    /// Port variable consulted by [`ServerConfig::from_env`]
    pub fn port_var(self) -> &'static str {
        match self {
            ServerKind::Plain => env::HTTP_PORT,
            ServerKind::Secure => env::HTTPS_PORT,
        }
    }

    /// Port used when the variable is unset
    pub fn default_port(self) -> u16 {
        match self {
            ServerKind::Plain => DEFAULT_HTTP_PORT,
            ServerKind::Secure => DEFAULT_HTTPS_PORT,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (host name or IP literal)
    pub address: String,
    /// Bind port, `0` for an ephemeral port
    pub port: u16,
    /// Directory containing the `public/` tree
    pub base_dir: PathBuf,
    /// TLS configuration
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_HTTP_PORT,
            base_dir: PathBuf::from("."),
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from the process environment
    pub fn from_env(kind: ServerKind) -> mirrorsocket_core::Result<Self> {
        Self::from_lookup(kind, |name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(kind: ServerKind, lookup: F) -> mirrorsocket_core::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_dir = match var(env::BASE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        let port = match var(kind.port_var()) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                Error::Config(ConfigError::InvalidValue {
                    field: kind.port_var().to_string(),
                    value: raw.clone(),
                })
            })?,
            None => kind.default_port(),
        };

        let tls = match kind {
            ServerKind::Plain => None,
            ServerKind::Secure => {
                let defaults = TlsConfig::in_dir(&base_dir);
                Some(TlsConfig::new(
                    var(env::CERTIFICATE_PATH).map(PathBuf::from).unwrap_or(defaults.cert_file),
                    var(env::KEY_PATH).map(PathBuf::from).unwrap_or(defaults.key_file),
                ))
            }
        };

        let config = Self {
            address: var(env::ADDRESS).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            port,
            base_dir,
            tls,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> mirrorsocket_core::Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config(ConfigError::Validation(
                "address must not be empty".to_string(),
            )));
        }

        if self.base_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Validation(
                "base_dir must not be empty".to_string(),
            )));
        }

        if let Some(tls) = &self.tls {
            if tls.cert_file.as_os_str().is_empty() || tls.key_file.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Validation(
                    "certificate and key paths must not be empty".to_string(),
                )));
            }
        }

        Ok(())
    }

    /// Directory served to clients
    pub fn public_root(&self) -> PathBuf {
        self.base_dir.join("public")
    }
}

/// TLS configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to certificate file
    pub cert_file: PathBuf,
    /// Path to private key file
    pub key_file: PathBuf,
}

impl TlsConfig {
    /// Create a new TLS configuration
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        }
    }

    /// `<dir>/tls/cert.pem` and `<dir>/tls/key.pem`
    pub fn in_dir(dir: &Path) -> Self {
        let tls = dir.join(TLS_DIR);
        Self::new(tls.join(CERT_FILE_NAME), tls.join(KEY_FILE_NAME))
    }
}
