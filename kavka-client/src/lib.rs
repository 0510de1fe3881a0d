//! # kavka-client
//!
//! Async TCP client for kavka.
//!
//! This crate provides:
//! - Framed request/response exchange over a single connection
//! - A typed ApiVersions call for capability negotiation

pub mod connection;
pub mod error;

pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
