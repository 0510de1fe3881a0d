//! Protocol error types and wire error codes.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated message: need {needed} more bytes")]
    Truncated { needed: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("invalid length field: {0}")]
    InvalidLength(i64),

    #[error("varint exceeds 32 bits")]
    VarintOverflow,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error codes carried in response bodies.
///
/// These are the Kafka protocol error code values and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ErrorCode {
    None = 0,
    UnsupportedVersion = 35,
}

impl From<ErrorCode> for i16 {
    fn from(code: ErrorCode) -> Self {
        code as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(i16::from(ErrorCode::None), 0);
        assert_eq!(i16::from(ErrorCode::UnsupportedVersion), 35);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Truncated { needed: 4 };
        assert!(err.to_string().contains("4"));

        let err = ProtocolError::FrameTooLarge { size: 200, max: 100 };
        assert!(err.to_string().contains("200"));

        let err = ProtocolError::InvalidLength(-2);
        assert!(err.to_string().contains("-2"));
    }
}
