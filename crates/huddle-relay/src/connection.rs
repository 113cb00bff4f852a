//! Per-connection handler: read `join`, register, then relay frames.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use huddle_session::protocol::{SignalingMessage, UserInfo};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::protocol::{parse_room_path, prepare, RoomKey};
use crate::rooms::RoomRegistry;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, registry: RoomRegistry) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let mut room = None;
                    let callback = |req: &Request, resp: Response| {
                        room = parse_room_path(req.uri().path());
                        if room.is_some() {
                            Ok(resp)
                        } else {
                            let mut err = ErrorResponse::new(Some("unknown room path".into()));
                            *err.status_mut() = StatusCode::NOT_FOUND;
                            Err(err)
                        }
                    };
                    match accept_hdr_async(stream, callback).await {
                        Ok(ws) => {
                            if let Some(key) = room {
                                handle_connection(ws, addr, key, registry).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Handle a single WebSocket connection to one room.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    key: RoomKey,
    registry: RoomRegistry,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. The first frame must be `join`.
    let Some(user) = read_join(&mut stream, addr).await else {
        let _ = sink.send(Message::Close(None)).await;
        return;
    };

    // 2. Register and send the roster.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let roster = match registry.join(&key, user.clone(), tx).await {
        Ok(roster) => roster,
        Err(e) => {
            tracing::warn!(peer = %addr, room = %key.1, error = %e, "Join refused");
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    let participants = SignalingMessage::Participants {
        participants: roster,
    };
    if send_message(&mut sink, &participants).await.is_err() {
        registry.leave(&key, &user.id).await;
        return;
    }

    // 3. Relay loop.
    loop {
        tokio::select! {
            Some(text) = rx.recv() => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let mut message = match SignalingMessage::decode(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Dropping undecodable frame");
                                continue;
                            }
                        };
                        let delivery = prepare(&mut message, &user.id);
                        registry.forward(&key, &user.id, delivery, &message).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 4. Cleanup.
    tracing::info!(peer = %addr, room = %key.1, user_id = %user.id, "Client disconnected");
    registry.leave(&key, &user.id).await;
}

/// Read the first frame and require it to be `join`.
async fn read_join(stream: &mut WsSource, addr: SocketAddr) -> Option<UserInfo> {
    let frame = tokio::time::timeout(JOIN_TIMEOUT, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match SignalingMessage::decode(&text) {
            Ok(SignalingMessage::Join { user, .. }) => Some(user),
            Ok(other) => {
                tracing::warn!(peer = %addr, kind = other.tag(), "Expected join");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid join message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text join frame");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during join");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before join");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, "Join timeout");
            None
        }
    }
}

async fn send_message(
    sink: &mut WsSink,
    message: &SignalingMessage,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match message.encode() {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode message");
            Ok(())
        }
    }
}
