//! # kavka-protocol
//!
//! Kafka wire protocol implementation for kavka.
//!
//! This crate provides:
//! - Length-prefixed binary framing
//! - Big-endian primitive codec, including the flexible (compact) encodings
//! - Request/Response header types and body decoding
//! - ApiVersions request and response bodies (versions 0 through 3)

pub mod api_versions;
pub mod codec;
pub mod error;
pub mod message;

pub use api_versions::{ApiVersionKey, ApiVersionsRequest, ApiVersionsResponse};
pub use error::{ErrorCode, ProtocolError};
pub use message::{ApiKey, Request, RequestBody, RequestHeader, Response, ResponseBody};

/// Default port for kavka, matching the Kafka convention.
pub const DEFAULT_PORT: u16 = 9092;

/// Size of the frame length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum frame payload size (100 MB). Declared lengths above this are
/// rejected before any body bytes are read.
pub const MAX_FRAME_SIZE: u32 = 100 * 1024 * 1024;
