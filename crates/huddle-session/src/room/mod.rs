//! Per-room controller.
//!
//! A [`RoomController`] is built on join and consumed on leave. It owns
//! every piece of room state and runs a single event loop over signaling
//! events, peer events, local input and the VAD frame clock.

mod dispatch;
mod input;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use huddle_common::HuddleError;
use huddle_config::HuddleConfig;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::canvas::{CanvasSurface, CanvasSync, RecordingSurface, StrokePoint};
use crate::chat::{ChatHistory, ChatMessage};
use crate::identity::Identity;
use crate::media::{CaptureConstraints, MediaBackend, MediaController, MediaStream, PeerEvent};
use crate::membership::{MembershipTracker, Participant};
use crate::peer::PeerConnectionManager;
use crate::protocol::{RoomKind, Tool};
use crate::signaling::{SignalingChannel, SignalingEvent};
use crate::spatial::SpatialAudioRenderer;
use crate::vad::VoiceActivityDetector;

/// Notifications for the UI.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Relay connection open and `join` sent.
    Joined { room_id: String, kind: RoomKind },
    RosterChanged { participants: Vec<Participant> },
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    /// Remote audio (voice room) or screen (collaboration room).
    RemoteStream {
        participant_id: String,
        stream: MediaStream,
    },
    TalkingChanged {
        participant_id: String,
        talking: bool,
    },
    Chat(ChatMessage),
    ScreenShareStarted,
    ScreenShareStopped,
    PeerFailed { participant_id: String },
    Error(String),
    Left,
}

/// Everything the local user can do in a room.
#[derive(Debug, Clone)]
pub enum LocalInput {
    SetMuted(bool),
    ToggleMute,
    KeyDown(String),
    KeyUp(String),
    SetPushToTalk(bool),
    SetPushToTalkKey(String),
    /// Processing toggles for the next capture; a device switch
    /// applies them mid-call.
    SetConstraints(CaptureConstraints),
    SetNoiseSuppression(bool),
    SetEchoCancellation(bool),
    SelectInputDevice(String),
    SelectOutputDevice(String),
    SetVolume(u8),
    SetDeafened(bool),
    SetSpatialAudio(bool),
    StartScreenShare,
    StopScreenShare,
    PointerDown(StrokePoint),
    PointerMove(StrokePoint),
    /// Release or leaving the canvas.
    PointerUp,
    SetTool(Tool),
    SetColor(String),
    SetBrushSize(f64),
    ClearCanvas,
    SendChat(String),
    Leave,
}

pub struct JoinOptions {
    pub room_id: String,
    pub kind: RoomKind,
    pub identity: Identity,
    pub config: HuddleConfig,
    /// Drawing target for the shared canvas. Strokes are recorded
    /// headlessly when `None`.
    pub surface: Option<Box<dyn CanvasSurface>>,
    /// Where device picks and push-to-talk settings are saved. Nothing is
    /// written when `None`.
    pub config_path: Option<PathBuf>,
}

impl JoinOptions {
    pub fn new(room_id: &str, kind: RoomKind, identity: Identity) -> Self {
        Self {
            room_id: room_id.to_string(),
            kind,
            identity,
            config: HuddleConfig::default(),
            surface: None,
            config_path: None,
        }
    }

    pub fn with_config(mut self, config: HuddleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_surface(mut self, surface: Box<dyn CanvasSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

pub struct RoomController {
    room_id: String,
    kind: RoomKind,
    identity: Identity,
    backend: Arc<dyn MediaBackend>,
    signaling: SignalingChannel,
    signaling_rx: Option<mpsc::Receiver<SignalingEvent>>,
    peer_rx: Option<mpsc::Receiver<PeerEvent>>,
    membership: MembershipTracker,
    peers: PeerConnectionManager,
    media: MediaController,
    vad: VoiceActivityDetector,
    spatial: SpatialAudioRenderer,
    canvas: CanvasSync,
    chat: ChatHistory,
    events_tx: mpsc::Sender<RoomEvent>,
    config: HuddleConfig,
    config_path: Option<PathBuf>,
    frame_interval: Duration,
    sharing: bool,
    closed: bool,
}

impl RoomController {
    /// Join a room.
    ///
    /// Voice rooms capture the microphone first; if that fails nothing is
    /// opened and the error is returned for the user to see.
    pub async fn join(
        options: JoinOptions,
        backend: Arc<dyn MediaBackend>,
    ) -> Result<(Self, mpsc::Receiver<RoomEvent>), HuddleError> {
        let mut media = MediaController::new(
            Arc::clone(&backend),
            &options.config.audio,
            &options.config.push_to_talk,
        );
        if options.kind == RoomKind::VoiceChat {
            media.acquire_local_stream().await?;
        }

        let (signaling, signaling_rx) = SignalingChannel::connect(
            &options.config.signaling,
            options.kind,
            &options.room_id,
            &options.identity,
        )?;
        info!(room_id = %options.room_id, kind = ?options.kind, "Joining room");

        Ok(Self::from_parts(
            options,
            backend,
            signaling,
            signaling_rx,
            media,
        ))
    }

    pub(crate) fn from_parts(
        options: JoinOptions,
        backend: Arc<dyn MediaBackend>,
        signaling: SignalingChannel,
        signaling_rx: mpsc::Receiver<SignalingEvent>,
        media: MediaController,
    ) -> (Self, mpsc::Receiver<RoomEvent>) {
        let JoinOptions {
            room_id,
            kind,
            identity,
            config,
            surface,
            config_path,
        } = options;

        let buffer = config.signaling.event_buffer.max(1) as usize;
        let (events_tx, events_rx) = mpsc::channel(buffer);
        let (peer_tx, peer_rx) = mpsc::channel(buffer);

        let peers = PeerConnectionManager::new(
            &identity.id,
            Arc::clone(&backend),
            config.ice.servers.clone(),
            signaling.clone(),
            peer_tx,
        );
        let surface = surface.unwrap_or_else(|| Box::new(RecordingSurface::new()));

        let mut room = Self {
            membership: MembershipTracker::new(&identity.id, kind),
            peers,
            media,
            vad: VoiceActivityDetector::new(&config.vad),
            spatial: SpatialAudioRenderer::new(&config.spatial),
            canvas: CanvasSync::new(&config.canvas, surface),
            chat: ChatHistory::new(&config.chat),
            frame_interval: Duration::from_millis(u64::from(config.vad.frame_interval_ms.max(1))),
            room_id,
            kind,
            identity,
            backend,
            signaling,
            signaling_rx: Some(signaling_rx),
            peer_rx: Some(peer_rx),
            events_tx,
            config,
            config_path,
            sharing: false,
            closed: false,
        };
        room.attach_vad();
        (room, events_rx)
    }

    // -- accessors -----------------------------------------------------------

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn participants(&self) -> &[Participant] {
        self.membership.participants()
    }

    pub fn peers(&self) -> &PeerConnectionManager {
        &self.peers
    }

    pub fn media(&self) -> &MediaController {
        &self.media
    }

    pub fn spatial(&self) -> &SpatialAudioRenderer {
        &self.spatial
    }

    pub fn canvas(&self) -> &CanvasSync {
        &self.canvas
    }

    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    pub fn is_sharing(&self) -> bool {
        self.sharing
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn signaling(&self) -> &SignalingChannel {
        &self.signaling
    }

    /// Enumerate devices for the pickers.
    pub async fn list_devices(&mut self) -> Result<crate::media::DeviceList, HuddleError> {
        Ok(self.media.list_devices().await?)
    }

    // -- internals -----------------------------------------------------------

    /// Hand an event to the UI without blocking the room loop.
    fn emit(&self, event: RoomEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(room_id = %self.room_id, event = ?event, "Room event queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(room_id = %self.room_id, "Room event receiver dropped");
            }
        }
    }

    /// The stream our outbound senders carry.
    fn outbound_stream(&self) -> Option<MediaStream> {
        match self.kind {
            RoomKind::VoiceChat => self.media.local_stream().cloned(),
            RoomKind::Collaboration if self.sharing => self.media.screen_stream().cloned(),
            RoomKind::Collaboration => None,
        }
    }

    /// Meter the current microphone stream.
    fn attach_vad(&mut self) {
        if self.kind != RoomKind::VoiceChat {
            return;
        }
        let Some(stream) = self.media.local_stream() else {
            self.vad.detach();
            return;
        };
        match self.backend.create_analyser(stream, self.vad.fft_size()) {
            Ok(analyser) => self.vad.attach(analyser),
            Err(e) => {
                warn!(error = %e, "Voice activity detection unavailable");
                self.vad.detach();
            }
        }
    }

    /// Release everything local without touching the transport.
    fn teardown_local(&mut self) {
        self.media.teardown();
        self.vad.detach();
        self.spatial.clear();
        self.peers.close_all();
        self.sharing = false;
    }

    /// Leave the room: stop local tracks, close every peer session, then
    /// close the signaling transport.
    pub async fn leave(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.teardown_local();
        self.signaling.disconnect().await;
        self.membership.clear();
        info!(room_id = %self.room_id, "Left room");
        self.emit(RoomEvent::Left);
    }

    /// Drive the room until the user leaves or the relay goes away.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<LocalInput>) {
        let (Some(mut signaling_rx), Some(mut peer_rx)) =
            (self.signaling_rx.take(), self.peer_rx.take())
        else {
            warn!(room_id = %self.room_id, "Room already running");
            return;
        };

        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                Some(event) = signaling_rx.recv() => {
                    self.handle_signaling_event(event).await;
                    if self.closed {
                        break;
                    }
                }
                Some(event) = peer_rx.recv() => {
                    self.handle_peer_event(event).await;
                }
                input = inputs.recv() => match input {
                    Some(LocalInput::Leave) | None => {
                        self.leave().await;
                        break;
                    }
                    Some(input) => {
                        if let Err(e) = self.handle_input(input).await {
                            warn!(room_id = %self.room_id, error = %e, "Input failed");
                            self.emit(RoomEvent::Error(e.to_string()));
                        }
                    }
                },
                _ = frames.tick() => {
                    self.tick().await;
                }
            }
        }
        debug!(room_id = %self.room_id, "Room loop finished");
    }
}
