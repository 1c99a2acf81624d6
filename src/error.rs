use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("allocation of {0}b failed")]
    Alloc(usize),

    #[error("nothing registered at {0}")]
    NotFound(String),

    #[error("body of {len}b exceeds the maximum of {max}b")]
    BodyTooLarge { len: usize, max: usize },

    #[error("receive failed after {received}b of {expected}b: {source}")]
    Receive {
        received: usize,
        expected: usize,
        #[source]
        source: io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("engine does not support tls")]
    TlsUnsupported,

    #[error("request head too large, limit {0}b")]
    HeadTooLarge(usize),

    #[error("http parse fail: {0}")]
    HttpParse(#[from] httparse::Error),

    #[error("bad config: {0}")]
    Config(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
