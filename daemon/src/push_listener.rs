//! TCP intake for real-time pushes
//!
//! Clients write one JSON message per line. Every line is handed to the
//! [`PushBridge`] and answered with `{"accepted": bool}` so senders can tell a
//! forwarded notification from an ignored frame.

use crate::{DaemonError, Result};
use callsheet_core::PushBridge;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Maximum allowed push frame size (64KB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct PushListener {
    bridge: PushBridge,
}

impl PushListener {
    pub fn new(bridge: PushBridge) -> Self {
        Self { bridge }
    }

    /// Bind the listen socket.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| DaemonError::ServerError(format!("Failed to bind push listener to {addr}: {e}")))
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local: SocketAddr = listener.local_addr()?;
        info!("Push listener accepting on {}", local);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Push listener on {} stopping", local);
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Push connection from {}", peer);
                        let listener = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = listener.handle_connection(stream).await {
                                warn!("Push connection from {} closed: {} ({})", peer, e, e.code());
                            }
                        });
                    }
                    Err(e) => warn!("Failed to accept push connection: {}", e),
                },
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let (reader_half, mut writer_half) = stream.into_split();
        let mut reader = BufReader::new(reader_half);
        let mut frame = Vec::with_capacity(1024);

        loop {
            frame.clear();
            let limit = (MAX_FRAME_SIZE + 1) as u64;
            let n = (&mut reader).take(limit).read_until(b'\n', &mut frame).await?;
            if n == 0 {
                break;
            }

            let terminated = matches!(frame.last(), Some(b'\n'));
            if terminated {
                frame.pop();
                if matches!(frame.last(), Some(b'\r')) {
                    frame.pop();
                }
            }
            if frame.len() > MAX_FRAME_SIZE || (!terminated && n as u64 == limit) {
                return Err(DaemonError::ConnectionError(format!(
                    "Push frame exceeds maximum allowed size of {MAX_FRAME_SIZE} bytes"
                )));
            }
            if frame.is_empty() {
                continue;
            }

            let accepted = self.bridge.intake_frame(&frame);
            let mut ack = serde_json::to_vec(&json!({ "accepted": accepted }))?;
            ack.push(b'\n');
            writer_half.write_all(&ack).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsheet_cache::MemoryCache;
    use callsheet_core::{spawn_coordinator, CoordinatorParts, MockNotificationService};
    use schema::CoordinatorConfig;
    use std::sync::Arc;
    use tokio::sync::{broadcast, oneshot};

    fn listener() -> PushListener {
        let (event_tx, _) = broadcast::channel(16);
        let handle = spawn_coordinator(CoordinatorParts {
            config: CoordinatorConfig::default(),
            service: Arc::new(MockNotificationService::new()),
            cache: Arc::new(MemoryCache::new()),
            event_tx,
        });
        PushListener::new(PushBridge::new(handle))
    }

    async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_acks_every_frame_and_skips_blank_lines() {
        let push = listener();
        let socket = PushListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            push.serve(socket, async {
                let _ = stop_rx.await;
            })
            .await
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        reader
            .get_mut()
            .write_all(b"\r\n{\"kind\":\"presence\"}\r\nnot json\n")
            .await
            .unwrap();

        assert_eq!(read_line(&mut reader).await, "{\"accepted\":false}\n");
        assert_eq!(read_line(&mut reader).await, "{\"accepted\":false}\n");

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let push = listener();
        let socket = PushListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move { push.serve(socket, std::future::pending()).await });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        let oversized = vec![b'x'; MAX_FRAME_SIZE + 10];
        let _ = reader.get_mut().write_all(&oversized).await;

        let mut rest = Vec::new();
        let n = reader.read_to_end(&mut rest).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_server_error() {
        let taken = PushListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let err = PushListener::bind(&addr).await.unwrap_err();
        assert_eq!(err.code(), "DAEMON001");
    }
}
