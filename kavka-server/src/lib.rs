//! # kavka-server
//!
//! TCP server for kavka.
//!
//! This crate provides:
//! - TCP connection acceptance with async I/O
//! - The per-connection read/decode/dispatch/encode/write loop
//! - A dispatch table routing requests to message handlers by api key
//! - The ApiVersions handler

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod versions;

pub use config::{Config, LimitsConfig, NetworkConfig};
pub use connection::Connection;
pub use dispatch::{Dispatcher, MessageHandler};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use versions::ApiVersionsHandler;
