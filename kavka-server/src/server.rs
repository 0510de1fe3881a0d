//! TCP server implementation.
//!
//! The server owns the listening socket and the dispatch table. Each accepted
//! connection is handed to a fresh [`Connection`] on its own task;
//! connections share nothing but the read-only dispatch table and the stats
//! counters.

use crate::config::Config;
use crate::connection::Connection;
use crate::dispatch::{Dispatcher, MessageHandler};
use crate::error::ServerError;
use kavka_protocol::MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum accepted frame payload size.
    pub max_frame_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], kavka_protocol::DEFAULT_PORT)),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            max_frame_size: config.limits.max_frame_size,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for kavka.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
    /// Signals the accept loop to exit; in-flight connections drain.
    stop: broadcast::Sender<()>,
    /// Signals in-flight connections to close at the next frame boundary.
    conn_shutdown: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Creates a new server with the given message handlers.
    ///
    /// Pure construction: the dispatch table is built here, no I/O happens
    /// until [`start`](Server::start).
    pub fn new(config: ServerConfig, handlers: Vec<Arc<dyn MessageHandler>>) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        let (conn_shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new(handlers)),
            stats: Arc::new(ServerStats::default()),
            stop: stop_tx,
            conn_shutdown: conn_shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            accept_task: None,
        }
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Returns once the socket is bound; accepting runs on its own task. A
    /// bind failure (address unavailable, port in use) is returned to the
    /// caller.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        let listener =
            TcpListener::bind(self.config.bind_addr)
                .await
                .map_err(|source| ServerError::Bind {
                    addr: self.config.bind_addr,
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", local_addr);

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let max_frame_size = self.config.max_frame_size;
        let conn_shutdown = self.conn_shutdown.clone();
        let running = self.running.clone();
        let mut stop_rx = self.stop.subscribe();

        self.accept_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::debug!("Listener closed, no longer accepting connections");
                        break;
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::debug!("Accepted connection from {}", addr);
                                stats.connections_total.fetch_add(1, Ordering::Relaxed);
                                stats.connections_active.fetch_add(1, Ordering::Relaxed);

                                let connection = Connection::new(
                                    stream,
                                    addr,
                                    dispatcher.clone(),
                                    stats.clone(),
                                    max_frame_size,
                                    conn_shutdown.subscribe(),
                                );
                                let stats = stats.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = connection.run().await {
                                        tracing::debug!("[{}] Connection error: {}", addr, e);
                                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                    }
                                    stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                    tracing::info!("Client disconnected: {}", addr);
                                });
                            }
                            // Known limitation: any accept error stops the
                            // loop; no transient-error retry.
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }

    /// Stops accepting new connections.
    ///
    /// Already-accepted connections keep draining. A no-op when the server
    /// is not running.
    pub fn stop(&self) {
        if !self.is_running() {
            tracing::debug!("Server not running");
            return;
        }
        tracing::info!("Stopping server");
        let _ = self.stop.send(());
    }

    /// Stops accepting and asks in-flight connections to close at their next
    /// frame boundary.
    pub fn shutdown_all(&self) {
        self.stop();
        let _ = self.conn_shutdown.send(());
    }

    /// Waits for the accept loop to finish. Call after [`stop`](Server::stop).
    pub async fn join(&mut self) {
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
    }

    /// The bound address, available after a successful `start()`. Useful when
    /// binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
