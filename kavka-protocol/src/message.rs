//! Request and response envelope types.
//!
//! A request frame payload starts with the request header (api key, api
//! version, correlation id, client id) followed by the api-specific body.
//! A response frame payload starts with the correlation id copied from the
//! request, followed by the encoded response body.

use crate::api_versions::ApiVersionsRequest;
use crate::codec;
use crate::error::ProtocolError;
use crate::{LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Kafka API keys.
///
/// Only a subset of the protocol's keys is listed; anything else decodes to
/// `Unknown` and is rejected at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Produce,
    Fetch,
    ListOffsets,
    Metadata,
    OffsetCommit,
    OffsetFetch,
    FindCoordinator,
    JoinGroup,
    Heartbeat,
    LeaveGroup,
    SyncGroup,
    ApiVersions,
    CreateTopics,
    Unknown(i16),
}

impl From<i16> for ApiKey {
    fn from(value: i16) -> Self {
        match value {
            0 => ApiKey::Produce,
            1 => ApiKey::Fetch,
            2 => ApiKey::ListOffsets,
            3 => ApiKey::Metadata,
            8 => ApiKey::OffsetCommit,
            9 => ApiKey::OffsetFetch,
            10 => ApiKey::FindCoordinator,
            11 => ApiKey::JoinGroup,
            12 => ApiKey::Heartbeat,
            13 => ApiKey::LeaveGroup,
            14 => ApiKey::SyncGroup,
            18 => ApiKey::ApiVersions,
            19 => ApiKey::CreateTopics,
            n => ApiKey::Unknown(n),
        }
    }
}

impl From<ApiKey> for i16 {
    fn from(key: ApiKey) -> Self {
        match key {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::ListOffsets => 2,
            ApiKey::Metadata => 3,
            ApiKey::OffsetCommit => 8,
            ApiKey::OffsetFetch => 9,
            ApiKey::FindCoordinator => 10,
            ApiKey::JoinGroup => 11,
            ApiKey::Heartbeat => 12,
            ApiKey::LeaveGroup => 13,
            ApiKey::SyncGroup => 14,
            ApiKey::ApiVersions => 18,
            ApiKey::CreateTopics => 19,
            ApiKey::Unknown(n) => n,
        }
    }
}

impl ApiKey {
    /// Static name for logging without allocation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKey::Produce => "Produce",
            ApiKey::Fetch => "Fetch",
            ApiKey::ListOffsets => "ListOffsets",
            ApiKey::Metadata => "Metadata",
            ApiKey::OffsetCommit => "OffsetCommit",
            ApiKey::OffsetFetch => "OffsetFetch",
            ApiKey::FindCoordinator => "FindCoordinator",
            ApiKey::JoinGroup => "JoinGroup",
            ApiKey::Heartbeat => "Heartbeat",
            ApiKey::LeaveGroup => "LeaveGroup",
            ApiKey::SyncGroup => "SyncGroup",
            ApiKey::ApiVersions => "ApiVersions",
            ApiKey::CreateTopics => "CreateTopics",
            ApiKey::Unknown(_) => "Unknown",
        }
    }
}

/// Decoded request header.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    /// Decodes a request header.
    ///
    /// ApiVersions v3+ uses a hybrid format per KIP-511: the client id keeps
    /// the standard i16-length encoding, but an empty tagged-field section
    /// follows it.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let api_key_raw = codec::get_i16(buf)?;
        let api_version = codec::get_i16(buf)?;
        let correlation_id = codec::get_i32(buf)?;
        let client_id = codec::get_nullable_string(buf)?;

        let api_key = ApiKey::from(api_key_raw);
        if api_key == ApiKey::ApiVersions && api_version >= 3 {
            codec::skip_tagged_fields(buf)?;
        }

        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
        })
    }

    /// Encodes a request header (the client-side inverse of [`decode`]).
    ///
    /// [`decode`]: RequestHeader::decode
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        buf.put_i16(self.api_key.into());
        buf.put_i16(self.api_version);
        buf.put_i32(self.correlation_id);
        codec::put_nullable_string(buf, self.client_id.as_deref())?;
        if self.api_key == ApiKey::ApiVersions && self.api_version >= 3 {
            codec::put_empty_tagged_fields(buf);
        }
        Ok(())
    }
}

/// Api-specific request body.
#[derive(Debug, Clone)]
pub enum RequestBody {
    ApiVersions(ApiVersionsRequest),
    /// Body bytes of an api key this build does not decode.
    Unknown(Bytes),
}

/// A decoded request: header plus typed body.
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    pub body: RequestBody,
}

impl Request {
    /// Decodes a request from one frame payload.
    pub fn decode(payload: Bytes) -> Result<Self, ProtocolError> {
        let mut buf = payload;
        let header = RequestHeader::decode(&mut buf)?;

        let body = match header.api_key {
            ApiKey::ApiVersions => RequestBody::ApiVersions(ApiVersionsRequest::decode(
                &mut buf,
                header.api_version,
            )?),
            _ => RequestBody::Unknown(buf.copy_to_bytes(buf.remaining())),
        };

        Ok(Self { header, body })
    }
}

/// An encoded response body together with its header style.
#[derive(Debug, Clone)]
pub struct ResponseBody {
    bytes: Bytes,
    flexible_header: bool,
}

impl ResponseBody {
    /// A body whose response header is the classic correlation-id-only form.
    pub fn standard(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            flexible_header: false,
        }
    }

    /// A body whose response header carries a trailing tagged-field section.
    pub fn flexible(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            flexible_header: true,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A response ready to be framed: correlation id plus encoded body.
#[derive(Debug, Clone)]
pub struct Response {
    pub correlation_id: i32,
    body: ResponseBody,
}

impl Response {
    pub fn new(correlation_id: i32, body: ResponseBody) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    /// Encodes the full frame: u32 length prefix, response header, body.
    pub fn encode_frame(&self) -> Result<BytesMut, ProtocolError> {
        let header_len = if self.body.flexible_header { 5 } else { 4 };
        let payload_len = header_len + self.body.bytes.len();
        if payload_len as u64 > MAX_FRAME_SIZE as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len as u32,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload_len);
        frame.put_u32(payload_len as u32);
        frame.put_i32(self.correlation_id);
        if self.body.flexible_header {
            codec::put_empty_tagged_fields(&mut frame);
        }
        frame.put_slice(&self.body.bytes);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(api_key: i16, api_version: i16, correlation_id: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&api_key.to_be_bytes());
        buf.extend_from_slice(&api_version.to_be_bytes());
        buf.extend_from_slice(&correlation_id.to_be_bytes());
        buf
    }

    #[test]
    fn test_api_key_roundtrip() {
        assert_eq!(ApiKey::from(18), ApiKey::ApiVersions);
        assert_eq!(i16::from(ApiKey::ApiVersions), 18);
        assert_eq!(ApiKey::from(99), ApiKey::Unknown(99));
        assert_eq!(i16::from(ApiKey::Unknown(99)), 99);
    }

    #[test]
    fn test_header_decode_with_client_id() {
        let mut bytes = header_bytes(18, 2, 7);
        bytes.extend_from_slice(&[0x00, 0x04]);
        bytes.extend_from_slice(b"test");

        let mut buf = Bytes::from(bytes);
        let header = RequestHeader::decode(&mut buf).unwrap();
        assert_eq!(header.api_key, ApiKey::ApiVersions);
        assert_eq!(header.api_version, 2);
        assert_eq!(header.correlation_id, 7);
        assert_eq!(header.client_id.as_deref(), Some("test"));
    }

    #[test]
    fn test_header_decode_null_client_id() {
        let mut bytes = header_bytes(3, 0, 1);
        bytes.extend_from_slice(&[0xFF, 0xFF]);

        let mut buf = Bytes::from(bytes);
        let header = RequestHeader::decode(&mut buf).unwrap();
        assert_eq!(header.api_key, ApiKey::Metadata);
        assert_eq!(header.client_id, None);
    }

    #[test]
    fn test_header_decode_api_versions_v3_tagged_fields() {
        let mut bytes = header_bytes(18, 3, 1);
        bytes.extend_from_slice(&[0x00, 0x01]);
        bytes.push(b'c');
        bytes.push(0x00); // empty tagged fields per KIP-511

        let mut buf = Bytes::from(bytes);
        let header = RequestHeader::decode(&mut buf).unwrap();
        assert_eq!(header.api_version, 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_decode_truncated() {
        let mut buf = Bytes::from_static(&[0x00, 0x12, 0x00]);
        let result = RequestHeader::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let header = RequestHeader {
            api_key: ApiKey::ApiVersions,
            api_version: 3,
            correlation_id: 42,
            client_id: Some("kavka-test".to_string()),
        };
        let mut bytes = BytesMut::new();
        header.encode(&mut bytes).unwrap();

        let mut buf = bytes.freeze();
        let decoded = RequestHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded.api_key, ApiKey::ApiVersions);
        assert_eq!(decoded.correlation_id, 42);
        assert_eq!(decoded.client_id.as_deref(), Some("kavka-test"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_request_decode_unknown_key_keeps_body() {
        let mut bytes = header_bytes(99, 0, 5);
        bytes.extend_from_slice(&[0xFF, 0xFF]); // null client id
        bytes.extend_from_slice(b"opaque");

        let request = Request::decode(Bytes::from(bytes)).unwrap();
        assert_eq!(request.header.api_key, ApiKey::Unknown(99));
        match request.body {
            RequestBody::Unknown(body) => assert_eq!(&body[..], b"opaque"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_response_frame_layout() {
        let response = Response::new(7, ResponseBody::standard(Bytes::from_static(b"\x01\x02")));
        let frame = response.encode_frame().unwrap();

        // length = 4 (correlation id) + 2 (body)
        assert_eq!(&frame[..4], &[0x00, 0x00, 0x00, 0x06]);
        assert_eq!(&frame[4..8], &[0x00, 0x00, 0x00, 0x07]);
        assert_eq!(&frame[8..], &[0x01, 0x02]);
    }

    #[test]
    fn test_response_frame_flexible_header() {
        let response = Response::new(1, ResponseBody::flexible(Bytes::from_static(b"\xAA")));
        let frame = response.encode_frame().unwrap();

        // length = 4 (correlation id) + 1 (tagged fields) + 1 (body)
        assert_eq!(&frame[..4], &[0x00, 0x00, 0x00, 0x06]);
        assert_eq!(frame[8], 0x00); // empty tagged fields after correlation id
        assert_eq!(frame[9], 0xAA);
    }
}
