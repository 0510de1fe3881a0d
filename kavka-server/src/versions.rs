//! ApiVersions handler and the supported-version table.
//!
//! ApiVersions is the capability-negotiation message: the response declares
//! which api keys and version ranges this server speaks. The handler is
//! stateless and shared across all connections.

use crate::dispatch::MessageHandler;
use crate::error::ServerError;
use bytes::BytesMut;
use kavka_protocol::{
    ApiKey, ApiVersionKey, ApiVersionsResponse, ErrorCode, Request, RequestBody, ResponseBody,
};

/// Api versions this server supports.
///
/// When a new api is implemented, add its key and version range here and
/// register its handler in the server construction.
pub const SUPPORTED_VERSIONS: &[ApiVersionKey] =
    &[ApiVersionKey::new(ApiKey::ApiVersions, 0, 3)];

/// Handler for ApiVersions requests.
#[derive(Debug, Clone, Default)]
pub struct ApiVersionsHandler;

impl ApiVersionsHandler {
    pub fn new() -> Self {
        Self
    }

    fn supported(&self, version: i16) -> bool {
        SUPPORTED_VERSIONS
            .iter()
            .any(|key| key.api_key == ApiKey::ApiVersions && key.supports(version))
    }
}

impl MessageHandler for ApiVersionsHandler {
    fn api_key(&self) -> ApiKey {
        ApiKey::ApiVersions
    }

    fn handle(&self, request: &Request) -> Result<ResponseBody, ServerError> {
        let RequestBody::ApiVersions(ref body) = request.body else {
            return Err(ServerError::MalformedRequest { api: "ApiVersions" });
        };

        if let Some(name) = body.client_software_name.as_deref() {
            tracing::debug!(
                client_software = name,
                client_software_version = body.client_software_version.as_deref(),
                "ApiVersions request"
            );
        }

        // An out-of-range request version gets an UNSUPPORTED_VERSION v0
        // body so the client can fall back and renegotiate.
        let version = request.header.api_version;
        let (error_code, encode_version) = if self.supported(version) {
            (ErrorCode::None, version)
        } else {
            (ErrorCode::UnsupportedVersion, 0)
        };

        let response = ApiVersionsResponse {
            error_code: error_code.into(),
            api_keys: SUPPORTED_VERSIONS.to_vec(),
            throttle_time_ms: 0,
        };

        let mut bytes = BytesMut::new();
        response.encode(&mut bytes, encode_version)?;

        // Per KIP-511 even the v3 ApiVersions response keeps the old
        // correlation-id-only header, so the body is never flexible-headed.
        Ok(ResponseBody::standard(bytes.freeze()))
    }
}
