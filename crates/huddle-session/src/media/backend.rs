//! Capability traits implemented by the embedding platform.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{new_id, MediaError, SessionId};
use huddle_config::{AudioConfig, IceServer, SpatialConfig};
use tokio::sync::mpsc;

use crate::protocol::{IceCandidate, SessionDescription};

// ---------------------------------------------------------------------------
// Tracks and streams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single capture or remote track.
///
/// Handles are shared between the local stream and every outbound sender,
/// so toggling `enabled` on one handle is seen by all peers at once.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    /// Capture device, for local tracks.
    fn device_id(&self) -> Option<&str>;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Release the underlying device. Irreversible.
    fn stop(&self);
    fn is_live(&self) -> bool;
}

pub type TrackHandle = Arc<dyn MediaTrack>;

/// A bundle of tracks captured or received together.
#[derive(Debug, Clone)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<TrackHandle>,
}

impl MediaStream {
    pub fn new(tracks: Vec<TrackHandle>) -> Self {
        Self {
            id: new_id(),
            tracks,
        }
    }

    pub fn audio_track(&self) -> Option<&TrackHandle> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_track(&self) -> Option<&TrackHandle> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// Enable or disable audio tracks without touching video.
    pub fn set_audio_enabled(&self, enabled: bool) {
        for track in self.audio_tracks() {
            track.set_enabled(enabled);
        }
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Audio processing toggles passed to every microphone capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::from(&AudioConfig::default())
    }
}

impl From<&AudioConfig> for CaptureConstraints {
    fn from(config: &AudioConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// `None` captures from the system default input.
    pub device_id: Option<String>,
    pub constraints: CaptureConstraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    /// Empty until the user has granted capture permission.
    pub label: String,
}

impl MediaDeviceInfo {
    /// Label to show, falling back to a name built from the device id.
    pub fn display_label(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        let prefix = match self.kind {
            DeviceKind::AudioInput => "Microphone",
            DeviceKind::AudioOutput => "Speaker",
            DeviceKind::VideoInput => "Camera",
        };
        let short: String = self.device_id.chars().take(8).collect();
        format!("{prefix} {short}")
    }
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Asynchronous notifications from a peer connection.
///
/// Every event names the session that produced it so events from a
/// replaced connection can be told apart from the live one.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A locally gathered candidate to trickle to the peer.
    IceCandidate {
        participant_id: String,
        session_id: SessionId,
        candidate: IceCandidate,
    },
    RemoteTrack {
        participant_id: String,
        session_id: SessionId,
        stream: MediaStream,
    },
    StateChanged {
        participant_id: String,
        session_id: SessionId,
        state: PeerConnectionState,
    },
}

impl PeerEvent {
    pub fn participant_id(&self) -> &str {
        match self {
            PeerEvent::IceCandidate { participant_id, .. }
            | PeerEvent::RemoteTrack { participant_id, .. }
            | PeerEvent::StateChanged { participant_id, .. } => participant_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            PeerEvent::IceCandidate { session_id, .. }
            | PeerEvent::RemoteTrack { session_id, .. }
            | PeerEvent::StateChanged { session_id, .. } => session_id,
        }
    }
}

/// One WebRTC-style connection to a single remote participant.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Add an outbound sender for `track`.
    fn add_track(&mut self, track: TrackHandle, stream_id: &str) -> Result<(), MediaError>;

    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, MediaError>;

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), MediaError>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), MediaError>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError>;

    /// Swap the track on the sender of `kind` in place, without
    /// renegotiation. Returns `false` if there is no such sender.
    fn replace_track(&mut self, kind: TrackKind, track: TrackHandle) -> Result<bool, MediaError>;

    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Audio graph
// ---------------------------------------------------------------------------

/// Frequency-domain view of a stream.
pub trait FrequencyAnalyser: Send + Sync {
    /// Half the FFT size.
    fn frequency_bin_count(&self) -> usize;

    /// Fill `out` with the current byte magnitudes (0..=255).
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanningModel {
    EqualPower,
    Hrtf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceModel {
    Linear,
    Inverse,
    Exponential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PannerOptions {
    pub panning_model: PanningModel,
    pub distance_model: DistanceModel,
    pub ref_distance: f64,
    pub max_distance: f64,
    pub rolloff_factor: f64,
}

impl From<&SpatialConfig> for PannerOptions {
    fn from(config: &SpatialConfig) -> Self {
        Self {
            panning_model: PanningModel::Hrtf,
            distance_model: DistanceModel::Inverse,
            ref_distance: config.ref_distance,
            max_distance: config.max_distance,
            rolloff_factor: config.rolloff_factor,
        }
    }
}

/// A positional node inserted between a remote stream and the output.
pub trait AudioPanner: Send + Sync {
    fn set_position(&mut self, position: Position3);
    fn disconnect(&mut self);
}

/// How remote audio is played back.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// `None` plays on the system default output.
    pub sink_id: Option<String>,
    /// Linear gain, 0.0..=1.0.
    pub volume: f64,
    pub muted: bool,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Platform media primitives: capture, playback, peer connections and
/// audio analysis.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, MediaError>;

    async fn get_user_media(&self, request: &CaptureRequest) -> Result<MediaStream, MediaError>;

    /// Capture a screen or window chosen by the user.
    async fn get_display_media(&self) -> Result<MediaStream, MediaError>;

    fn create_peer_connection(
        &self,
        participant_id: &str,
        session_id: &SessionId,
        ice_servers: &[IceServer],
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>, MediaError>;

    fn create_analyser(
        &self,
        stream: &MediaStream,
        fft_size: usize,
    ) -> Result<Box<dyn FrequencyAnalyser>, MediaError>;

    /// Start playing a remote participant's audio.
    fn attach_remote_audio(
        &self,
        participant_id: &str,
        stream: &MediaStream,
        output: &OutputSettings,
    ) -> Result<(), MediaError>;

    fn set_remote_output(
        &self,
        participant_id: &str,
        output: &OutputSettings,
    ) -> Result<(), MediaError>;

    fn detach_remote_audio(&self, participant_id: &str);

    /// Route a participant's playback through a positional panner.
    fn create_panner(
        &self,
        participant_id: &str,
        options: &PannerOptions,
    ) -> Result<Box<dyn AudioPanner>, MediaError>;
}
