//! Scripted media backend for unit tests.
//!
//! Every call is recorded so tests can assert on what the session layer
//! asked the platform to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle_common::{new_id, MediaError, SessionId};
use huddle_config::IceServer;
use tokio::sync::mpsc;

use crate::media::{
    AudioPanner, CaptureRequest, DeviceKind, FrequencyAnalyser, MediaBackend, MediaDeviceInfo,
    MediaStream, MediaTrack, OutputSettings, PannerOptions, PeerConnection, PeerEvent, Position3,
    TrackHandle, TrackKind,
};
use crate::protocol::{IceCandidate, SessionDescription, SignalingMessage};
use crate::signaling::SignalingCommand;

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    device_id: String,
    enabled: AtomicBool,
    live: AtomicBool,
}

impl FakeTrack {
    fn handle(kind: TrackKind, device_id: &str) -> TrackHandle {
        Arc::new(Self {
            id: new_id(),
            kind,
            device_id: device_id.to_string(),
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
        })
    }

    pub fn audio(device_id: &str) -> TrackHandle {
        Self::handle(TrackKind::Audio, device_id)
    }

    pub fn video(device_id: &str) -> TrackHandle {
        Self::handle(TrackKind::Video, device_id)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn device_id(&self) -> Option<&str> {
        Some(&self.device_id)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

/// Everything a fake connection was asked to do.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub participant_id: String,
    pub session_id: SessionId,
    pub ice_servers: Vec<IceServer>,
    pub senders: Vec<(TrackKind, String)>,
    pub local_descriptions: Vec<SessionDescription>,
    pub remote_descriptions: Vec<SessionDescription>,
    pub candidates: Vec<IceCandidate>,
    pub replaced: Vec<String>,
    pub closed: bool,
}

impl PeerRecord {
    pub fn offers_created(&self) -> usize {
        self.local_descriptions
            .iter()
            .filter(|d| d.kind == crate::protocol::SdpType::Offer)
            .count()
    }

    pub fn answers_created(&self) -> usize {
        self.local_descriptions
            .iter()
            .filter(|d| d.kind == crate::protocol::SdpType::Answer)
            .count()
    }
}

struct FakePeer {
    record: Arc<Mutex<PeerRecord>>,
    senders: Vec<(TrackKind, TrackHandle)>,
    remote_set: bool,
    sdp_counter: u32,
}

impl FakePeer {
    fn sdp(&mut self, role: &str) -> String {
        self.sdp_counter += 1;
        let record = self.record.lock().unwrap();
        format!("{role}:{}:{}", record.session_id, self.sdp_counter)
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_track(&mut self, track: TrackHandle, _stream_id: &str) -> Result<(), MediaError> {
        self.record
            .lock()
            .unwrap()
            .senders
            .push((track.kind(), track.id().to_string()));
        self.senders.push((track.kind(), track));
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError> {
        Ok(SessionDescription::offer(self.sdp("offer")))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, MediaError> {
        if !self.remote_set {
            return Err(MediaError::Negotiation("no remote offer".into()));
        }
        Ok(SessionDescription::answer(self.sdp("answer")))
    }

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), MediaError> {
        self.record
            .lock()
            .unwrap()
            .local_descriptions
            .push(description);
        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), MediaError> {
        self.remote_set = true;
        self.record
            .lock()
            .unwrap()
            .remote_descriptions
            .push(description);
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError> {
        if !self.remote_set {
            return Err(MediaError::Negotiation(
                "candidate before remote description".into(),
            ));
        }
        self.record.lock().unwrap().candidates.push(candidate);
        Ok(())
    }

    fn replace_track(&mut self, kind: TrackKind, track: TrackHandle) -> Result<bool, MediaError> {
        let Some(slot) = self.senders.iter_mut().find(|(k, _)| *k == kind) else {
            return Ok(false);
        };
        let mut record = self.record.lock().unwrap();
        record.replaced.push(track.id().to_string());
        if let Some(entry) = record.senders.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = track.id().to_string();
        }
        slot.1 = track;
        Ok(true)
    }

    fn close(&mut self) {
        self.record.lock().unwrap().closed = true;
    }
}

// ---------------------------------------------------------------------------
// Analyser and panner
// ---------------------------------------------------------------------------

/// Produces a flat spectrum at a settable magnitude.
pub struct FakeAnalyser {
    bins: usize,
    magnitude: Arc<AtomicU8>,
}

#[derive(Clone)]
pub struct AnalyserHandle(Arc<AtomicU8>);

impl AnalyserHandle {
    pub fn set_magnitude(&self, value: u8) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl FakeAnalyser {
    pub fn new(fft_size: usize) -> (Self, AnalyserHandle) {
        let magnitude = Arc::new(AtomicU8::new(0));
        (
            Self {
                bins: fft_size / 2,
                magnitude: Arc::clone(&magnitude),
            },
            AnalyserHandle(magnitude),
        )
    }
}

impl FrequencyAnalyser for FakeAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        out.fill(self.magnitude.load(Ordering::SeqCst));
    }
}

#[derive(Debug, Clone, Default)]
struct PannerRecord {
    options: Option<PannerOptions>,
    positions: Vec<Position3>,
    disconnected: bool,
}

struct FakePanner {
    participant_id: String,
    panners: Arc<Mutex<HashMap<String, PannerRecord>>>,
}

impl AudioPanner for FakePanner {
    fn set_position(&mut self, position: Position3) {
        if let Some(record) = self.panners.lock().unwrap().get_mut(&self.participant_id) {
            record.positions.push(position);
        }
    }

    fn disconnect(&mut self) {
        if let Some(record) = self.panners.lock().unwrap().get_mut(&self.participant_id) {
            record.disconnected = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBackend {
    deny_capture: AtomicBool,
    capture_requests: Mutex<Vec<CaptureRequest>>,
    peers: Mutex<Vec<Arc<Mutex<PeerRecord>>>>,
    remote_outputs: Mutex<HashMap<String, OutputSettings>>,
    panners: Arc<Mutex<HashMap<String, PannerRecord>>>,
    input_magnitude: AnalyserHandle,
    analysers_created: Mutex<usize>,
}

impl Default for AnalyserHandle {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every following capture fails as if the user refused permission.
    pub fn deny_capture(&self) {
        self.deny_capture.store(true, Ordering::SeqCst);
    }

    pub fn allow_capture(&self) {
        self.deny_capture.store(false, Ordering::SeqCst);
    }

    pub fn capture_requests(&self) -> Vec<CaptureRequest> {
        self.capture_requests.lock().unwrap().clone()
    }

    /// Magnitude every analyser reports.
    pub fn set_input_magnitude(&self, value: u8) {
        self.input_magnitude.set_magnitude(value);
    }

    pub fn analysers_created(&self) -> usize {
        *self.analysers_created.lock().unwrap()
    }

    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.lock().unwrap().clone())
            .collect()
    }

    pub fn peer(&self, session_id: &SessionId) -> PeerRecord {
        self.peers()
            .into_iter()
            .find(|p| &p.session_id == session_id)
            .unwrap()
    }

    /// Connections that have not been closed.
    pub fn open_peer_count(&self) -> usize {
        self.peers().iter().filter(|p| !p.closed).count()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn remote_output(&self, participant_id: &str) -> Option<OutputSettings> {
        self.remote_outputs
            .lock()
            .unwrap()
            .get(participant_id)
            .cloned()
    }

    pub fn panner_positions(&self, participant_id: &str) -> Vec<Position3> {
        self.panners
            .lock()
            .unwrap()
            .get(participant_id)
            .map(|r| r.positions.clone())
            .unwrap_or_default()
    }

    pub fn panner_options(&self, participant_id: &str) -> Option<PannerOptions> {
        self.panners
            .lock()
            .unwrap()
            .get(participant_id)
            .and_then(|r| r.options.clone())
    }

    pub fn panner_disconnected(&self, participant_id: &str) -> bool {
        self.panners
            .lock()
            .unwrap()
            .get(participant_id)
            .is_some_and(|r| r.disconnected)
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, MediaError> {
        Ok(vec![
            MediaDeviceInfo {
                device_id: "builtin-mic".into(),
                kind: DeviceKind::AudioInput,
                label: "Built-in Microphone".into(),
            },
            MediaDeviceInfo {
                device_id: "usb-mic".into(),
                kind: DeviceKind::AudioInput,
                label: String::new(),
            },
            MediaDeviceInfo {
                device_id: "speakers".into(),
                kind: DeviceKind::AudioOutput,
                label: "Speakers".into(),
            },
            MediaDeviceInfo {
                device_id: "webcam".into(),
                kind: DeviceKind::VideoInput,
                label: "Webcam".into(),
            },
        ])
    }

    async fn get_user_media(&self, request: &CaptureRequest) -> Result<MediaStream, MediaError> {
        self.capture_requests.lock().unwrap().push(request.clone());
        if self.deny_capture.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied("microphone".into()));
        }
        let device = request.device_id.as_deref().unwrap_or("default");
        Ok(MediaStream::new(vec![FakeTrack::audio(device)]))
    }

    async fn get_display_media(&self) -> Result<MediaStream, MediaError> {
        Ok(MediaStream::new(vec![FakeTrack::video("screen")]))
    }

    fn create_peer_connection(
        &self,
        participant_id: &str,
        session_id: &SessionId,
        ice_servers: &[IceServer],
        _events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>, MediaError> {
        let record = Arc::new(Mutex::new(PeerRecord {
            participant_id: participant_id.to_string(),
            session_id: session_id.clone(),
            ice_servers: ice_servers.to_vec(),
            senders: Vec::new(),
            local_descriptions: Vec::new(),
            remote_descriptions: Vec::new(),
            candidates: Vec::new(),
            replaced: Vec::new(),
            closed: false,
        }));
        self.peers.lock().unwrap().push(Arc::clone(&record));
        Ok(Box::new(FakePeer {
            record,
            senders: Vec::new(),
            remote_set: false,
            sdp_counter: 0,
        }))
    }

    fn create_analyser(
        &self,
        _stream: &MediaStream,
        fft_size: usize,
    ) -> Result<Box<dyn FrequencyAnalyser>, MediaError> {
        *self.analysers_created.lock().unwrap() += 1;
        Ok(Box::new(FakeAnalyser {
            bins: fft_size / 2,
            magnitude: Arc::clone(&self.input_magnitude.0),
        }))
    }

    fn attach_remote_audio(
        &self,
        participant_id: &str,
        _stream: &MediaStream,
        output: &OutputSettings,
    ) -> Result<(), MediaError> {
        self.remote_outputs
            .lock()
            .unwrap()
            .insert(participant_id.to_string(), output.clone());
        Ok(())
    }

    fn set_remote_output(
        &self,
        participant_id: &str,
        output: &OutputSettings,
    ) -> Result<(), MediaError> {
        self.remote_outputs
            .lock()
            .unwrap()
            .insert(participant_id.to_string(), output.clone());
        Ok(())
    }

    fn detach_remote_audio(&self, participant_id: &str) {
        self.remote_outputs.lock().unwrap().remove(participant_id);
    }

    fn create_panner(
        &self,
        participant_id: &str,
        options: &PannerOptions,
    ) -> Result<Box<dyn AudioPanner>, MediaError> {
        self.panners.lock().unwrap().insert(
            participant_id.to_string(),
            PannerRecord {
                options: Some(options.clone()),
                ..PannerRecord::default()
            },
        );
        Ok(Box::new(FakePanner {
            participant_id: participant_id.to_string(),
            panners: Arc::clone(&self.panners),
        }))
    }
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Frames written to a detached signaling channel.
#[derive(Debug, Default)]
pub struct Drained {
    pub messages: Vec<SignalingMessage>,
    pub disconnected: bool,
}

impl Drained {
    pub fn tags(&self) -> Vec<&'static str> {
        self.messages.iter().map(SignalingMessage::tag).collect()
    }

    pub fn count(&self, tag: &str) -> usize {
        self.messages.iter().filter(|m| m.tag() == tag).count()
    }
}

pub fn drain(rx: &mut mpsc::Receiver<SignalingCommand>) -> Drained {
    let mut drained = Drained::default();
    while let Ok(command) = rx.try_recv() {
        match command {
            SignalingCommand::Send(text) => {
                drained.messages.push(SignalingMessage::decode(&text).unwrap())
            }
            SignalingCommand::Disconnect => drained.disconnected = true,
        }
    }
    drained
}
