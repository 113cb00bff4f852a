//! Background task owning the room socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::types::{SignalingCommand, SignalingEvent};
use crate::protocol::SignalingMessage;

/// Connect, write `join`, then pump frames both ways until either side
/// closes. Always finishes by emitting [`SignalingEvent::Disconnected`].
pub(crate) async fn connection_task(
    url: String,
    timeout: Duration,
    join: String,
    connected: Arc<RwLock<bool>>,
    event_tx: mpsc::Sender<SignalingEvent>,
    mut command_rx: mpsc::Receiver<SignalingCommand>,
) {
    info!(url = %url, "Connecting to relay");

    let ws_stream = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(&url)).await
    {
        Ok(Ok((ws_stream, _))) => ws_stream,
        Ok(Err(e)) => {
            error!(error = %e, url = %url, "Failed to connect to relay");
            let _ = event_tx
                .send(SignalingEvent::Error(format!("Connection failed: {e}")))
                .await;
            let _ = event_tx.send(SignalingEvent::Disconnected).await;
            return;
        }
        Err(_elapsed) => {
            error!(url = %url, secs = timeout.as_secs(), "Relay connection timed out");
            let _ = event_tx
                .send(SignalingEvent::Error(format!(
                    "Connection timed out after {}s",
                    timeout.as_secs()
                )))
                .await;
            let _ = event_tx.send(SignalingEvent::Disconnected).await;
            return;
        }
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();

    if let Err(e) = ws_write.send(WsMessage::Text(join.into())).await {
        warn!(error = %e, "Failed to send join");
        let _ = event_tx
            .send(SignalingEvent::Error(format!("Join failed: {e}")))
            .await;
        let _ = event_tx.send(SignalingEvent::Disconnected).await;
        return;
    }

    *connected.write().await = true;
    let _ = event_tx.send(SignalingEvent::Connected).await;
    info!(url = %url, "Joined room");

    loop {
        tokio::select! {
            frame = ws_read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match SignalingMessage::decode(&text) {
                    Ok(message) => {
                        debug!(kind = message.tag(), "Signaling recv");
                        if event_tx.send(SignalingEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "Skipping undecodable frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Relay closed connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    let _ = event_tx.send(SignalingEvent::Error(e.to_string())).await;
                    break;
                }
                Some(Ok(_)) => {}
            },
            command = command_rx.recv() => match command {
                Some(SignalingCommand::Send(text)) => {
                    if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "Failed to write frame");
                        let _ = event_tx.send(SignalingEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                Some(SignalingCommand::Disconnect) | None => {
                    let _ = ws_write.send(WsMessage::Close(None)).await;
                    info!("Signaling closed locally");
                    break;
                }
            },
        }
    }

    *connected.write().await = false;
    let _ = event_tx.send(SignalingEvent::Disconnected).await;
}
