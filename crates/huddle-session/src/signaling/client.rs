//! Public handle for one room's signaling connection.

use std::sync::Arc;
use std::time::Duration;

use huddle_common::SignalingError;
use huddle_config::SignalingConfig;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::connection::connection_task;
use super::types::{SignalingCommand, SignalingEvent};
use crate::identity::Identity;
use crate::protocol::{room_url, RoomKind, SignalingMessage};

/// Handle for sending to the relay.
///
/// Cheap to clone; every clone writes to the same socket. All methods are
/// non-blocking with respect to the network and hand frames to the
/// background connection task.
#[derive(Clone)]
pub struct SignalingChannel {
    room_id: String,
    command_tx: mpsc::Sender<SignalingCommand>,
    connected: Arc<RwLock<bool>>,
}

impl SignalingChannel {
    /// Open the room socket and start the background connection task.
    ///
    /// The `join` announcement is the first frame written once the socket
    /// is open. Returns `(channel, event_receiver)`.
    pub fn connect(
        config: &SignalingConfig,
        kind: RoomKind,
        room_id: &str,
        identity: &Identity,
    ) -> Result<(Self, mpsc::Receiver<SignalingEvent>), SignalingError> {
        let join = SignalingMessage::Join {
            room_id: room_id.to_string(),
            user: identity.to_user_info(),
        }
        .encode()?;

        let buffer = config.event_buffer.max(1) as usize;
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let connected = Arc::new(RwLock::new(false));

        let url = room_url(&config.server_url, kind, room_id);
        let timeout = Duration::from_secs(u64::from(config.connect_timeout_secs));

        tokio::spawn(connection_task(
            url,
            timeout,
            join,
            Arc::clone(&connected),
            event_tx,
            command_rx,
        ));

        Ok((
            Self {
                room_id: room_id.to_string(),
                command_tx,
                connected,
            },
            event_rx,
        ))
    }

    /// A channel with no socket behind it; written frames land in the
    /// returned receiver.
    #[cfg(test)]
    pub(crate) fn detached(
        room_id: &str,
        connected: bool,
    ) -> (Self, mpsc::Receiver<SignalingCommand>) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        (
            Self {
                room_id: room_id.to_string(),
                command_tx,
                connected: Arc::new(RwLock::new(connected)),
            },
            command_rx,
        )
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Write one message. Dropped with a warning if the socket is not open.
    pub async fn send(&self, message: &SignalingMessage) {
        if !self.is_connected().await {
            warn!(
                room_id = %self.room_id,
                kind = message.tag(),
                "Signaling not open, dropping message"
            );
            return;
        }

        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, kind = message.tag(), "Failed to encode signaling message");
                return;
            }
        };

        debug!(room_id = %self.room_id, kind = message.tag(), "Signaling send");
        if self
            .command_tx
            .send(SignalingCommand::Send(text))
            .await
            .is_err()
        {
            warn!(room_id = %self.room_id, "Signaling task gone, dropping message");
        }
    }

    /// Close the socket. Further sends are dropped.
    pub async fn disconnect(&self) {
        *self.connected.write().await = false;
        let _ = self.command_tx.send(SignalingCommand::Disconnect).await;
    }
}

impl std::fmt::Debug for SignalingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingChannel")
            .field("room_id", &self.room_id)
            .finish()
    }
}
