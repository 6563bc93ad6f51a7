//! WebSocket server: accept loop and per-session tasks.
//!
//! Each accepted connection is upgraded to a WebSocket session running in its
//! own Tokio task.  A session reads JSON text frames, passes each one to the
//! shared [`ControlHandler`] and writes the reply back as a text frame.
//!
//! Shutdown is cooperative: the accept loop and every session poll the shared
//! `running` flag at least every 200 ms.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handler::ControlHandler;
use super::messages::ControlResponse;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the control listener.
///
/// # Errors
///
/// Returns an error if the address cannot be bound (port in use, missing
/// permission).
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control listener on {addr}"))
}

/// Accepts connections on `listener` until `running` is cleared.
pub async fn serve(listener: TcpListener, handler: ControlHandler, running: Arc<AtomicBool>) {
    match listener.local_addr() {
        Ok(addr) => info!("control server listening on ws://{addr}"),
        Err(e) => warn!("control server listening on unknown address: {e}"),
    }
    let handler = Arc::new(handler);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping control accept loop");
            break;
        }

        // Short timeout so the loop notices the shutdown flag while idle.
        match timeout(POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let handler = Arc::clone(&handler);
                let running = Arc::clone(&running);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, handler, running).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<ControlHandler>,
    running: Arc<AtomicBool>,
) {
    let session = Uuid::new_v4();
    info!(%session, %peer_addr, "control session opened");
    match run_session(stream, session, handler, running).await {
        Ok(()) => info!(%session, "control session closed"),
        Err(e) => warn!(%session, "control session closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    session: Uuid,
    handler: Arc<ControlHandler>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed for session {session}"))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    while running.load(Ordering::Relaxed) {
        let frame = match timeout(POLL_INTERVAL, ws_rx.next()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(WsError::ConnectionClosed | WsError::Protocol(_)))) => break,
            Ok(Some(Err(e))) => return Err(e).context("WebSocket read failed"),
        };

        let response = match frame {
            WsMessage::Text(text) => {
                debug!(%session, "request: {text}");
                handler.handle(&text)
            }
            WsMessage::Binary(_) => ControlResponse::Rejected {
                error: "binary frames are not supported; send JSON text".to_string(),
            },
            WsMessage::Close(_) => break,
            // Pings are answered by tungstenite itself.
            _ => continue,
        };

        let json = serde_json::to_string(&response).context("failed to serialize reply")?;
        ws_tx
            .send(WsMessage::Text(json))
            .await
            .context("WebSocket send failed")?;
    }

    ws_tx.close().await.ok();
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::command_queue::CommandQueue;
    use crate::application::status::ManagerStatus;
    use crate::infrastructure::programs::builtin_registry;
    use retroboard_core::Command;
    use serde_json::{json, Value};
    use tokio::sync::watch;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    struct Running {
        addr: SocketAddr,
        running: Arc<AtomicBool>,
        queue: CommandQueue,
        _status: watch::Sender<ManagerStatus>,
    }

    async fn start() -> Running {
        let queue = CommandQueue::new();
        let (status_tx, status_rx) = watch::channel(ManagerStatus {
            current_program: Some("clock".to_string()),
            running: true,
            ..ManagerStatus::default()
        });
        let handler =
            ControlHandler::new(queue.sender(), status_rx, Arc::new(builtin_registry()));
        let listener = bind("127.0.0.1:0".parse().expect("addr"))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(serve(listener, handler, Arc::clone(&running)));
        Running {
            addr,
            running,
            queue,
            _status: status_tx,
        }
    }

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn round_trip(ws: &mut Client, request: &str) -> Value {
        ws.send(WsMessage::Text(request.to_string()))
            .await
            .expect("send");
        loop {
            match ws.next().await.expect("reply").expect("frame") {
                WsMessage::Text(text) => return serde_json::from_str(&text).expect("json"),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_command_over_websocket_is_enqueued() {
        // Arrange
        let mut server = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", server.addr))
            .await
            .expect("connect");

        // Act
        let reply = round_trip(&mut ws, r#"{"action":"settings","brightness":25}"#).await;

        // Assert
        assert_eq!(reply["type"], json!("accepted"));
        assert_eq!(
            server.queue.drain(),
            vec![Command::SetSettings { brightness: 25 }]
        );
        server.running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_query_and_rejection_over_websocket() {
        let server = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", server.addr))
            .await
            .expect("connect");

        let programs = round_trip(&mut ws, r#"{"query":"programs"}"#).await;
        let rejected = round_trip(&mut ws, r#"{"action":"switch","program":"ghost"}"#).await;
        let garbage = round_trip(&mut ws, "not json").await;

        assert_eq!(programs["type"], json!("programs"));
        assert_eq!(programs["current"], json!("clock"));
        assert_eq!(rejected["type"], json!("rejected"));
        assert!(rejected["error"]
            .as_str()
            .expect("error text")
            .contains("ghost"));
        assert_eq!(garbage["type"], json!("rejected"));
        server.running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_binary_frame_is_rejected() {
        let server = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", server.addr))
            .await
            .expect("connect");

        ws.send(WsMessage::Binary(vec![1, 2, 3])).await.expect("send");
        let reply = loop {
            if let WsMessage::Text(text) = ws.next().await.expect("reply").expect("frame") {
                break serde_json::from_str::<Value>(&text).expect("json");
            }
        };

        assert_eq!(reply["type"], json!("rejected"));
        server.running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_accept_loop_exits_when_flag_cleared() {
        let listener = bind("127.0.0.1:0".parse().expect("addr"))
            .await
            .expect("bind");
        let queue = CommandQueue::new();
        let (_status_tx, status_rx) = watch::channel(ManagerStatus::default());
        let handler =
            ControlHandler::new(queue.sender(), status_rx, Arc::new(builtin_registry()));
        let running = Arc::new(AtomicBool::new(false));

        let result = timeout(Duration::from_secs(2), serve(listener, handler, running)).await;

        assert!(result.is_ok(), "serve should return once the flag is cleared");
    }
}
