//! WebSocket upgrade handler and per-connection loops.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::hub::BroadcastHub;
use crate::AppState;

use super::events::{AuthenticatePayload, ClientFrame, ClientFrameType, ServerFrame};
use super::handler::{handle_authenticate, handle_frame};
use super::session::GatewaySession;

/// Close codes (4000-range for application-level).
const CLOSE_NORMAL: u16 = 1000;
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_AUTH_TIMEOUT: u16 = 4009;

const PING_INTERVAL_SECS: u64 = 30;
/// Replies queued between the read loop and the writer.
const REPLY_BUFFER: usize = 16;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let payload = match time::timeout(state.config.auth_timeout, await_authenticate(&mut ws_rx)).await {
        Ok(Ok(payload)) => payload,
        Ok(Err((code, reason))) => {
            tracing::debug!(%reason, "socket handshake failed");
            let _ = send_close(&mut ws_tx, code, reason).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_TIMEOUT, "Authentication timeout").await;
            return;
        }
    };

    let (session, frames) = match handle_authenticate(&state, payload).await {
        Ok(result) => result,
        Err(reason) => {
            tracing::debug!(%reason, "socket authentication failed");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
            return;
        }
    };

    let welcome = ServerFrame::authenticated(&session.client_id, &session.user_id).to_text();
    if ws_tx.send(Message::Text(welcome.into())).await.is_err() {
        state.hub.remove(&session.client_id);
        return;
    }

    tracing::info!(
        client_id = %session.client_id,
        user_id = %session.user_id,
        "socket client connected"
    );

    let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        frames,
        reply_rx,
        state.hub.clone(),
        session.client_id.clone(),
    ));

    let writer_finished = read_loop(&state, &session, ws_rx, reply_tx, &mut writer).await;

    state.hub.remove(&session.client_id);
    if !writer_finished {
        let _ = writer.await;
    }

    tracing::info!(
        client_id = %session.client_id,
        user_id = %session.user_id,
        "socket client disconnected"
    );
}

/// Waits for the first meaningful frame, which must be AUTHENTICATE.
async fn await_authenticate(ws_rx: &mut WsStream) -> Result<AuthenticatePayload, (u16, &'static str)> {
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => return Err((CLOSE_NORMAL, "client closed")),
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(?e, "ws read error during authentication");
                return Err((CLOSE_UNKNOWN_ERROR, "read error"));
            }
        };

        let frame: ClientFrame = serde_json::from_str(text.as_str())
            .map_err(|_| (CLOSE_UNKNOWN_ERROR, "Invalid JSON"))?;
        if frame.frame_type != ClientFrameType::AUTHENTICATE {
            return Err((CLOSE_NOT_AUTHENTICATED, "Expected AUTHENTICATE"));
        }
        return serde_json::from_value(frame.payload)
            .map_err(|_| (CLOSE_AUTH_FAILED, "Invalid AUTHENTICATE payload"));
    }
    Err((CLOSE_NORMAL, "connection closed before authentication"))
}

/// Returns whether the writer task has already finished.
async fn read_loop(
    state: &AppState,
    session: &GatewaySession,
    mut ws_rx: WsStream,
    reply_tx: mpsc::Sender<String>,
    writer: &mut tokio::task::JoinHandle<()>,
) -> bool {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientFrame>(text.as_str()) {
                            Ok(frame) => handle_frame(state, session, frame).await,
                            Err(_) => ServerFrame::error("INVALID_FRAME", "Frames must be JSON objects with a type"),
                        };
                        if reply_tx.send(reply.to_text()).await.is_err() {
                            return false;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Err(e)) => {
                        tracing::debug!(?e, client_id = %session.client_id, "ws read error");
                        return false;
                    }
                    Some(Ok(_)) => continue,
                }
            }
            // The hub dropped the client or a write failed.
            _ = &mut *writer => return true,
        }
    }
}

/// Sole owner of the socket's write half: hub frames, replies, keepalive.
async fn write_loop(
    mut ws_tx: WsSink,
    mut frames: mpsc::Receiver<Arc<str>>,
    mut replies: mpsc::Receiver<String>,
    hub: Arc<BroadcastHub>,
    client_id: String,
) {
    let mut keepalive = time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    keepalive.tick().await; // First tick fires immediately; skip it.

    loop {
        let written = tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => ws_tx.send(Message::Text(Utf8Bytes::from(&*frame))).await,
                None => {
                    let _ = send_close(&mut ws_tx, CLOSE_NORMAL, "closed").await;
                    break;
                }
            },
            reply = replies.recv() => match reply {
                Some(text) => ws_tx.send(Message::Text(text.into())).await,
                None => break,
            },
            _ = keepalive.tick() => ws_tx.send(Message::Ping(Default::default())).await,
        };

        if let Err(e) = written {
            tracing::debug!(?e, client_id = %client_id, "socket write failed");
            hub.remove(&client_id);
            break;
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }));
    ws_tx.send(close_msg).await
}
