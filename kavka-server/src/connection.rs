//! Per-connection request/response loop.
//!
//! Each accepted connection is served by one `Connection` running on its own
//! task: read one length-prefixed frame, decode the request, dispatch it,
//! write the framed response, repeat. Strictly one request in flight per
//! connection; the next frame is not read until the previous response has
//! been fully written.

use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::server::ServerStats;
use bytes::Bytes;
use kavka_protocol::{ProtocolError, Request};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

/// Serves one client connection until it ends.
pub struct Connection<S> {
    stream: S,
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
    max_frame_size: u32,
    shutdown: broadcast::Receiver<()>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(
        stream: S,
        addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        stats: Arc<ServerStats>,
        max_frame_size: u32,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            stream,
            addr,
            dispatcher,
            stats,
            max_frame_size,
            shutdown,
        }
    }

    /// Runs the request/response loop to completion.
    ///
    /// Returns `Ok(())` on a clean client disconnect; any error closes this
    /// connection only. The stream is owned and dropped on return, so the
    /// socket is released exactly once regardless of where the loop exits.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            // The shutdown receiver is only signalled by a full server
            // shutdown; stop() alone lets connections drain.
            let payload = tokio::select! {
                biased;
                _ = recv_shutdown(&mut self.shutdown) => {
                    tracing::debug!("[{}] Shutdown signal received", self.addr);
                    return Err(ServerError::ShuttingDown);
                }
                frame = read_frame(&mut self.stream, self.max_frame_size) => {
                    match frame? {
                        Some(payload) => payload,
                        None => {
                            tracing::debug!("[{}] Connection closed by client", self.addr);
                            return Ok(());
                        }
                    }
                }
            };

            let request = Request::decode(payload)?;
            tracing::debug!(
                "[{}] Request: {} v{} (correlation_id={}, client_id={:?})",
                self.addr,
                request.header.api_key.as_str(),
                request.header.api_version,
                request.header.correlation_id,
                request.header.client_id,
            );

            self.stats.requests_total.fetch_add(1, Ordering::Relaxed);
            let response = self.dispatcher.dispatch(&request)?;

            let frame = response.encode_frame()?;
            tracing::debug!("[{}] Writing {} bytes", self.addr, frame.len());
            self.stream.write_all(&frame).await?;
        }
    }
}

/// Resolves when a shutdown is signalled. A closed channel means the server
/// was dropped without signalling; the connection keeps draining.
async fn recv_shutdown(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

/// Reads one frame: a 4-byte big-endian length prefix, then that many bytes.
///
/// `read_exact` retries short reads until the buffer is full or the stream
/// ends. End-of-stream at the length-prefix boundary is the normal client
/// disconnect and yields `Ok(None)`; end-of-stream inside a frame is a
/// framing error.
async fn read_frame<S>(stream: &mut S, max_frame_size: u32) -> Result<Option<Bytes>, ServerError>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        }
        .into());
    }

    let mut payload = vec![0u8; len as usize];
    match stream.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(Bytes::from(payload))),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ServerError::Framing { context: "body" })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MessageHandler;
    use crate::versions::ApiVersionsHandler;
    use kavka_protocol::MAX_FRAME_SIZE;

    fn test_connection(
        stream: tokio::io::DuplexStream,
    ) -> Connection<tokio::io::DuplexStream> {
        let dispatcher = Arc::new(Dispatcher::new(vec![
            Arc::new(ApiVersionsHandler::new()) as Arc<dyn MessageHandler>
        ]));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Connection::new(
            stream,
            "127.0.0.1:0".parse().unwrap(),
            dispatcher,
            Arc::new(ServerStats::default()),
            MAX_FRAME_SIZE,
            shutdown_rx,
        )
    }

    fn api_versions_frame(api_version: i16, correlation_id: i32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&18i16.to_be_bytes());
        payload.extend_from_slice(&api_version.to_be_bytes());
        payload.extend_from_slice(&correlation_id.to_be_bytes());
        payload.extend_from_slice(&[0xFF, 0xFF]); // null client id

        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&payload);
        frame
    }

    #[tokio::test]
    async fn test_clean_eof_is_ok() {
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(test_connection(server).run());

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_eof_mid_body_is_framing_error() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(test_connection(server).run());

        // Declare 10 payload bytes but only send 3
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ServerError::Framing { .. })));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(test_connection(server).run());

        client
            .write_all(&(MAX_FRAME_SIZE + 1).to_be_bytes())
            .await
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_key_closes_without_response() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(test_connection(server).run());

        // Metadata (key 3) has no registered handler
        let mut payload = Vec::new();
        payload.extend_from_slice(&3i16.to_be_bytes());
        payload.extend_from_slice(&0i16.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        payload.extend_from_slice(&[0xFF, 0xFF]);
        client
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        client.write_all(&payload).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ServerError::UnsupportedApiKey(3))));

        // Nothing was written back before the close
        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_request_response_exchange() {
        let (mut client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(test_connection(server).run());

        client
            .write_all(&api_versions_frame(1, 17))
            .await
            .unwrap();

        let mut len_buf = [0u8; 4];
        client.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        client.read_exact(&mut payload).await.unwrap();

        assert_eq!(&payload[..4], &17i32.to_be_bytes());

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_sequential_requests_in_order() {
        let (mut client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(test_connection(server).run());

        for correlation_id in [1, 2, 3] {
            client
                .write_all(&api_versions_frame(0, correlation_id))
                .await
                .unwrap();

            let mut len_buf = [0u8; 4];
            client.read_exact(&mut len_buf).await.unwrap();
            let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            client.read_exact(&mut payload).await.unwrap();
            assert_eq!(&payload[..4], &correlation_id.to_be_bytes());
        }

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }
}
