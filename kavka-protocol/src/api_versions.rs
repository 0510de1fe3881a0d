//! ApiVersions request and response bodies, versions 0 through 3.
//!
//! Version differences:
//! - request v0-v2: empty body; v3 adds compact client software name and
//!   version plus tagged fields.
//! - response v0: error_code + api_keys array; v1-v2 append throttle_time_ms;
//!   v3 switches to the flexible body (compact array, tagged fields).
//!
//! Per KIP-511 the v3 *response header* stays in the old correlation-id-only
//! format so clients can parse it before version negotiation completes.

use crate::codec;
use crate::error::ProtocolError;
use crate::message::ApiKey;
use bytes::{Buf, BufMut};

/// ApiVersions request body.
#[derive(Debug, Clone, Default)]
pub struct ApiVersionsRequest {
    pub client_software_name: Option<String>,
    pub client_software_version: Option<String>,
}

impl ApiVersionsRequest {
    pub fn decode(buf: &mut impl Buf, api_version: i16) -> Result<Self, ProtocolError> {
        if api_version < 3 {
            return Ok(Self::default());
        }
        let client_software_name = codec::get_compact_nullable_string(buf)?;
        let client_software_version = codec::get_compact_nullable_string(buf)?;
        codec::skip_tagged_fields(buf)?;
        Ok(Self {
            client_software_name,
            client_software_version,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut, api_version: i16) -> Result<(), ProtocolError> {
        if api_version < 3 {
            return Ok(());
        }
        codec::put_compact_nullable_string(buf, self.client_software_name.as_deref());
        codec::put_compact_nullable_string(buf, self.client_software_version.as_deref());
        codec::put_empty_tagged_fields(buf);
        Ok(())
    }
}

/// One supported version range in an ApiVersions response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionKey {
    pub api_key: ApiKey,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionKey {
    pub const fn new(api_key: ApiKey, min_version: i16, max_version: i16) -> Self {
        Self {
            api_key,
            min_version,
            max_version,
        }
    }

    pub const fn supports(&self, version: i16) -> bool {
        version >= self.min_version && version <= self.max_version
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        buf.put_i16(self.api_key.into());
        buf.put_i16(self.min_version);
        buf.put_i16(self.max_version);
        Ok(())
    }

    fn encode_flexible(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        self.encode(buf)?;
        codec::put_empty_tagged_fields(buf);
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        Ok(Self {
            api_key: ApiKey::from(codec::get_i16(buf)?),
            min_version: codec::get_i16(buf)?,
            max_version: codec::get_i16(buf)?,
        })
    }
}

/// ApiVersions response body.
#[derive(Debug, Clone)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionKey>,
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    pub fn encode(&self, buf: &mut impl BufMut, api_version: i16) -> Result<(), ProtocolError> {
        if api_version >= 3 {
            return self.encode_flexible(buf);
        }
        buf.put_i16(self.error_code);
        codec::put_array(buf, &self.api_keys, |b, key| key.encode(b))?;
        // throttle_time_ms was added in v1
        if api_version >= 1 {
            buf.put_i32(self.throttle_time_ms);
        }
        Ok(())
    }

    /// Flexible (v3+) body: compact array and tagged-field sections. The
    /// optional SupportedFeatures/FinalizedFeatures tags are omitted.
    fn encode_flexible(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        buf.put_i16(self.error_code);
        codec::put_compact_array(buf, &self.api_keys, |b, key| key.encode_flexible(b))?;
        buf.put_i32(self.throttle_time_ms);
        codec::put_empty_tagged_fields(buf);
        Ok(())
    }

    pub fn decode(buf: &mut impl Buf, api_version: i16) -> Result<Self, ProtocolError> {
        if api_version >= 3 {
            return Self::decode_flexible(buf);
        }
        let error_code = codec::get_i16(buf)?;
        let count = codec::get_i32(buf)?;
        if count < 0 {
            return Err(ProtocolError::InvalidLength(count as i64));
        }
        // Each entry is at least 6 bytes; don't preallocate past what the
        // buffer could actually hold, the count is untrusted wire data.
        let mut api_keys = Vec::with_capacity((count as usize).min(buf.remaining() / 6));
        for _ in 0..count {
            api_keys.push(ApiVersionKey::decode(buf)?);
        }
        let throttle_time_ms = if api_version >= 1 {
            codec::get_i32(buf)?
        } else {
            0
        };
        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }

    fn decode_flexible(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let error_code = codec::get_i16(buf)?;
        let count_plus_one = codec::get_unsigned_varint(buf)?;
        let count = count_plus_one.saturating_sub(1) as usize;
        let mut api_keys = Vec::with_capacity(count.min(buf.remaining() / 7));
        for _ in 0..count {
            let key = ApiVersionKey::decode(buf)?;
            codec::skip_tagged_fields(buf)?;
            api_keys.push(key);
        }
        let throttle_time_ms = codec::get_i32(buf)?;
        codec::skip_tagged_fields(buf)?;
        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }
}
