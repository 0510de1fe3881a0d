//! Connection management.

use crate::error::ClientError;
use bytes::{BufMut, Bytes, BytesMut};
use kavka_protocol::{
    ApiKey, ApiVersionsRequest, ApiVersionsResponse, RequestHeader, LENGTH_PREFIX_SIZE,
    MAX_FRAME_SIZE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Client id sent in every request header.
    pub client_id: Option<String>,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// A single connection to a kavka server.
///
/// Requests are strictly sequential: one exchange completes before the next
/// begins, matching the server's per-connection ordering guarantee.
pub struct Connection {
    stream: TcpStream,
    config: ConnectionConfig,
    next_correlation_id: AtomicI32,
}

impl Connection {
    /// Connects to the server.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| ClientError::Timeout)??;
        tracing::debug!("Connected to {}", config.addr);
        Ok(Self {
            stream,
            config,
            next_correlation_id: AtomicI32::new(1),
        })
    }

    /// The correlation id the next request will carry.
    fn next_correlation_id(&self) -> i32 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Performs capability negotiation, returning which api keys and version
    /// ranges the server supports.
    pub async fn api_versions(
        &mut self,
        api_version: i16,
    ) -> Result<ApiVersionsResponse, ClientError> {
        let correlation_id = self.next_correlation_id();
        self.api_versions_with_correlation(api_version, correlation_id)
            .await
    }

    /// Like [`api_versions`](Connection::api_versions) with a caller-chosen
    /// correlation id.
    pub async fn api_versions_with_correlation(
        &mut self,
        api_version: i16,
        correlation_id: i32,
    ) -> Result<ApiVersionsResponse, ClientError> {
        let header = RequestHeader {
            api_key: ApiKey::ApiVersions,
            api_version,
            correlation_id,
            client_id: self.config.client_id.clone(),
        };

        let mut payload = BytesMut::new();
        header.encode(&mut payload)?;
        ApiVersionsRequest::default().encode(&mut payload, api_version)?;

        let mut response = timeout(
            self.config.request_timeout,
            self.exchange(payload.freeze(), correlation_id),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;

        Ok(ApiVersionsResponse::decode(&mut response, api_version)?)
    }

    /// Writes one framed request and reads back the framed response body,
    /// verifying the echoed correlation id.
    async fn exchange(&mut self, payload: Bytes, correlation_id: i32) -> Result<Bytes, ClientError> {
        let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        frame.put_u32(payload.len() as u32);
        frame.put_slice(&payload);
        self.stream.write_all(&frame).await?;

        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ClientError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_SIZE {
            return Err(kavka_protocol::ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            }
            .into());
        }

        let mut response = vec![0u8; len as usize];
        self.stream.read_exact(&mut response).await?;

        let mut body = Bytes::from(response);
        let received = kavka_protocol::codec::get_i32(&mut body)?;
        if received != correlation_id {
            return Err(ClientError::CorrelationMismatch {
                sent: correlation_id,
                received,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ConnectionConfig::new("127.0.0.1:9092".parse().unwrap())
            .with_client_id("test")
            .with_connect_timeout(Duration::from_secs(1))
            .with_request_timeout(Duration::from_secs(2));

        assert_eq!(config.client_id.as_deref(), Some("test"));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }
}
