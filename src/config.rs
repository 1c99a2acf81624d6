use crate::dispatch::MAX_CONTENT_RECEIVE;
use crate::error::{Error, Result};

/// Certificate and private key, PEM or DER as the engine expects.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlsMaterial {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

// Keys stay out of logs.
impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert", &format_args!("{}b", self.cert.len()))
            .field("key", &"..")
            .finish()
    }
}

/// Settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServerConfig {
    /// Only used in logs and thread names.
    pub name: String,
    pub port: u16,
    /// Stack size of every worker thread the engine spawns.
    pub stack_size: usize,
    /// Open connections served at the same time.
    pub max_sockets: usize,
    /// Largest accepted POST body.
    pub max_body: usize,
    /// Close the oldest connection to admit a new one when all sockets are in
    /// use, instead of turning the new one away.
    pub lru_purge: bool,
    pub recv_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub tls: Option<TlsMaterial>,
}

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_SECURE_PORT: u16 = 443;
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_SOCKETS: usize = 7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

impl ServerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        ServerConfig {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn secure(name: impl Into<String>, cert: Vec<u8>, key: Vec<u8>) -> Self {
        ServerConfig {
            name: name.into(),
            port: DEFAULT_SECURE_PORT,
            tls: Some(TlsMaterial { cert, key }),
            ..Default::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn max_sockets(mut self, max_sockets: usize) -> Self {
        self.max_sockets = max_sockets;
        self
    }

    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn lru_purge(mut self, enabled: bool) -> Self {
        self.lru_purge = enabled;
        self
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sockets == 0 {
            return Err(Error::Config("max_sockets must be at least 1"));
        }
        if self.stack_size == 0 {
            return Err(Error::Config("stack_size must be non-zero"));
        }
        if let Some(tls) = &self.tls {
            if tls.cert.is_empty() || tls.key.is_empty() {
                return Err(Error::Config("tls needs both a certificate and a key"));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "qweb".into(),
            port: DEFAULT_PORT,
            stack_size: DEFAULT_STACK_SIZE,
            max_sockets: DEFAULT_MAX_SOCKETS,
            max_body: MAX_CONTENT_RECEIVE,
            lru_purge: true,
            recv_timeout_secs: DEFAULT_TIMEOUT_SECS,
            send_timeout_secs: DEFAULT_TIMEOUT_SECS,
            tls: None,
        }
    }
}
