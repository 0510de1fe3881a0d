//! Server error types.

use kavka_protocol::ProtocolError;
use std::net::SocketAddr;
use thiserror::Error;

/// Server errors.
///
/// Everything except `Bind` is scoped to a single connection: the connection
/// is closed and siblings are unaffected.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed while reading {context}")]
    Framing { context: &'static str },

    #[error("no handler registered for api key {0}")]
    UnsupportedApiKey(i16),

    #[error("malformed {api} request: body does not match handler")]
    MalformedRequest { api: &'static str },

    #[error("server shutting down")]
    ShuttingDown,
}
