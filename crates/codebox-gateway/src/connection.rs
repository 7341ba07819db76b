//! Per-connection handler: handshake, bootstrap, then the ready loop.
//!
//! `Connecting -> Bootstrapping -> Ready -> Closed`. Whatever path a
//! connection takes, the registry entry is closed exactly once on the way
//! out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use codebox_common::{ConnectionId, ProtocolError};
use codebox_config::schema::ServerConfig;
use codebox_terminal::{PtyEvent, Utf8Decoder};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::protocol::{self, Outbound};
use crate::router::Router;
use crate::state::GatewayState;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Longest close reason a control frame can carry.
const MAX_CLOSE_REASON: usize = 123;

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Bootstrapping,
    Ready,
    Closed,
}

/// Session parameters carried in the upgrade request query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HandshakeParams {
    pub session_id: Option<String>,
    pub language: Option<String>,
}

impl HandshakeParams {
    /// Parse `replId` (or `sessionId`) and `language` from a query string.
    /// Empty values count as missing.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value);
            if value.is_empty() {
                continue;
            }
            match key {
                "replId" => params.session_id = Some(value),
                "sessionId" if params.session_id.is_none() => params.session_id = Some(value),
                "language" => params.language = Some(value),
                _ => {}
            }
        }
        params
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn ws_config(server: &ServerConfig) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(server.max_message_bytes))
        .max_frame_size(Some(server.max_message_bytes))
}

fn close_reason(text: &str) -> String {
    if text.len() <= MAX_CLOSE_REASON {
        return text.to_string();
    }
    let mut end = MAX_CLOSE_REASON;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Handle a single accepted TCP connection.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<GatewayState>) {
    let conn_id = ConnectionId::new();

    let mut query = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        query = req.uri().query().unwrap_or_default().to_string();
        Ok(resp)
    };
    let ws = match tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        callback,
        Some(ws_config(&state.config.server)),
    )
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "WS handshake failed");
            return;
        }
    };

    let (mut sink, mut stream) = ws.split();
    let params = HandshakeParams::from_query(&query);
    tracing::info!(peer = %peer, conn_id = %conn_id.short(), "client connected");

    let state_reached = run(&mut sink, &mut stream, conn_id, params, &state).await;

    // Closed.
    state.registry.close(&conn_id).await;
    let _ = sink.close().await;
    tracing::info!(
        peer = %peer,
        conn_id = %conn_id.short(),
        last_state = ?state_reached,
        "client disconnected"
    );
}

/// Drive the connection until it should close. Returns the last state
/// reached before `Closed`.
async fn run(
    sink: &mut WsSink,
    stream: &mut WsStream,
    conn_id: ConnectionId,
    params: HandshakeParams,
    state: &GatewayState,
) -> ConnState {
    // Connecting
    let (Some(session_id), Some(language)) = (params.session_id, params.language) else {
        tracing::warn!(conn_id = %conn_id.short(), "missing replId or language");
        send_close(sink, CloseCode::Policy, "missing replId or language").await;
        return ConnState::Connecting;
    };

    // Bootstrapping
    let (pty_tx, mut pty_rx) = mpsc::channel::<PtyEvent>(state.config.server.outbound_buffer);
    let (session, root) = match state
        .registry
        .open(conn_id, &session_id, &language, pty_tx)
        .await
    {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!(
                conn_id = %conn_id.short(),
                session = %session_id,
                error = %e,
                "session bootstrap failed"
            );
            send_close(sink, CloseCode::Error, &e.to_string()).await;
            return ConnState::Bootstrapping;
        }
    };

    // Ready
    if send(sink, &Outbound::loaded(&root)).await.is_err() {
        return ConnState::Ready;
    }

    let server = &state.config.server;
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(server.outbound_buffer);
    let router = Router::new(Arc::clone(&session), out_tx);
    let cancel = session.cancel_token();
    let mut decoder = Utf8Decoder::new();
    let mut terminal_open = true;

    let heartbeat_timeout = Duration::from_secs(server.heartbeat_timeout_secs);
    let ping_period = Duration::from_secs(server.ping_interval_secs);
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(conn_id = %conn_id.short(), "session cancelled");
                break;
            }

            Some(reply) = out_rx.recv() => {
                if send(sink, &reply).await.is_err() {
                    break;
                }
            }

            event = pty_rx.recv(), if terminal_open => {
                let outbound = match event {
                    Some(PtyEvent::Output(bytes)) => {
                        let text = decoder.decode(&bytes);
                        if text.is_empty() {
                            continue;
                        }
                        Outbound::terminal(text)
                    }
                    Some(PtyEvent::Exited { code }) => {
                        terminal_open = false;
                        let tail = decoder.finish();
                        if !tail.is_empty() && send(sink, &Outbound::terminal(tail)).await.is_err() {
                            break;
                        }
                        Outbound::terminal_closed(code)
                    }
                    None => {
                        terminal_open = false;
                        continue;
                    }
                };
                if send(sink, &outbound).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => handle_text(&router, conn_id, text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => handle_text(&router, conn_id, text),
                        Err(_) => tracing::warn!(
                            conn_id = %conn_id.short(),
                            error = %ProtocolError::InvalidUtf8,
                            "dropping message"
                        ),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = %conn_id.short(), error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() > heartbeat_timeout {
                    tracing::warn!(conn_id = %conn_id.short(), "heartbeat timeout");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    ConnState::Ready
}

fn handle_text(router: &Router, conn_id: ConnectionId, text: &str) {
    match protocol::decode(text) {
        Ok(Some(msg)) => router.dispatch(msg),
        Ok(None) => tracing::debug!(conn_id = %conn_id.short(), "ignoring unknown message type"),
        Err(e) => tracing::warn!(conn_id = %conn_id.short(), error = %e, "dropping message"),
    }
}

/// Send an outbound message as a JSON text frame.
async fn send(
    sink: &mut WsSink,
    message: &Outbound,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match message.encode() {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(kind = message.kind(), error = %e, "failed to encode message");
            Ok(())
        }
    }
}

async fn send_close(sink: &mut WsSink, code: CloseCode, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: close_reason(reason).into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_from_query() {
        let p = HandshakeParams::from_query("replId=abc&language=python");
        assert_eq!(p.session_id.as_deref(), Some("abc"));
        assert_eq!(p.language.as_deref(), Some("python"));
    }

    #[test]
    fn params_accept_session_id_alias() {
        let p = HandshakeParams::from_query("sessionId=s1&language=node");
        assert_eq!(p.session_id.as_deref(), Some("s1"));

        // replId wins when both are present.
        let p = HandshakeParams::from_query("sessionId=s1&replId=r1&language=node");
        assert_eq!(p.session_id.as_deref(), Some("r1"));
    }

    #[test]
    fn params_decode_and_skip_empty() {
        let p = HandshakeParams::from_query("replId=my%20repl&language=&extra");
        assert_eq!(p.session_id.as_deref(), Some("my repl"));
        assert_eq!(p.language, None);

        let p = HandshakeParams::from_query("replId=a+b&language=c%2B%2B");
        assert_eq!(p.session_id.as_deref(), Some("a b"));
        assert_eq!(p.language.as_deref(), Some("c++"));

        assert_eq!(HandshakeParams::from_query(""), HandshakeParams::default());
    }

    #[test]
    fn close_reason_is_truncated_on_char_boundary() {
        assert_eq!(close_reason("short"), "short");
        let long = "é".repeat(100); // 200 bytes
        let reason = close_reason(&long);
        assert!(reason.len() <= MAX_CLOSE_REASON);
        assert!(reason.chars().all(|c| c == 'é'));
    }
}
