//! Client error types.

use kavka_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("operation timed out")]
    Timeout,

    #[error("correlation id mismatch: sent {sent}, received {received}")]
    CorrelationMismatch { sent: i32, received: i32 },
}
