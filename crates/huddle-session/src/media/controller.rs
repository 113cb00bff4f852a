//! Local capture state: microphone, mute, push-to-talk, output routing and
//! screen capture.

use std::collections::BTreeSet;
use std::sync::Arc;

use huddle_common::MediaError;
use huddle_config::{AudioConfig, PushToTalkConfig};
use tracing::{debug, info, warn};

use super::backend::{
    CaptureConstraints, CaptureRequest, DeviceKind, MediaBackend, MediaDeviceInfo, MediaStream,
    OutputSettings, TrackHandle,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushToTalkState {
    pub enabled: bool,
    pub key: String,
    /// The key is currently held.
    pub pressed: bool,
}

/// Snapshot of everything the local user controls.
#[derive(Debug, Clone)]
pub struct LocalMediaState {
    pub input_device_id: Option<String>,
    pub output_device_id: Option<String>,
    pub stream: Option<MediaStream>,
    pub constraints: CaptureConstraints,
    pub muted: bool,
    pub push_to_talk: PushToTalkState,
    pub talking: bool,
    /// Input level, 0..=100.
    pub level: u8,
    /// Remote playback silenced.
    pub deafened: bool,
    /// Remote playback volume, 0..=100.
    pub volume: u8,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub inputs: Vec<MediaDeviceInfo>,
    pub outputs: Vec<MediaDeviceInfo>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Owns the local stream and the playback settings for remote audio.
pub struct MediaController {
    backend: Arc<dyn MediaBackend>,
    state: LocalMediaState,
    screen: Option<MediaStream>,
    remote_audio: BTreeSet<String>,
}

impl MediaController {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        audio: &AudioConfig,
        push_to_talk: &PushToTalkConfig,
    ) -> Self {
        Self {
            backend,
            state: LocalMediaState {
                input_device_id: non_empty(&audio.input_device),
                output_device_id: non_empty(&audio.output_device),
                stream: None,
                constraints: CaptureConstraints::from(audio),
                muted: push_to_talk.enabled,
                push_to_talk: PushToTalkState {
                    enabled: push_to_talk.enabled,
                    key: push_to_talk.key.clone(),
                    pressed: false,
                },
                talking: false,
                level: 0,
                deafened: false,
                volume: audio.volume.min(100) as u8,
            },
            screen: None,
            remote_audio: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> &LocalMediaState {
        &self.state
    }

    pub fn local_stream(&self) -> Option<&MediaStream> {
        self.state.stream.as_ref()
    }

    pub fn screen_stream(&self) -> Option<&MediaStream> {
        self.screen.as_ref()
    }

    pub fn is_muted(&self) -> bool {
        self.state.muted
    }

    pub fn is_talking(&self) -> bool {
        self.state.talking
    }

    pub fn push_to_talk_enabled(&self) -> bool {
        self.state.push_to_talk.enabled
    }

    // -- capture -------------------------------------------------------------

    /// Capture the microphone with the current device and constraints.
    ///
    /// The new tracks start enabled or disabled according to the mute
    /// state. The previous local stream is stopped only once the new one
    /// is live; on failure it stays in place.
    pub async fn acquire_local_stream(&mut self) -> Result<MediaStream, MediaError> {
        let request = CaptureRequest {
            device_id: self.state.input_device_id.clone(),
            constraints: self.state.constraints.clone(),
        };
        let stream = self.backend.get_user_media(&request).await.map_err(|e| {
            warn!(error = %e, device = ?request.device_id, "Microphone capture failed");
            e
        })?;
        stream.set_audio_enabled(!self.state.muted);
        if let Some(old) = self.state.stream.replace(stream.clone()) {
            old.stop_all();
        }
        info!(
            stream_id = %stream.id,
            device = ?request.device_id,
            "Local stream acquired"
        );
        Ok(stream)
    }

    /// Move capture to another input device.
    ///
    /// Returns the new audio track for the caller to swap into every
    /// outbound sender, or `None` if nothing was being captured. If the
    /// new device cannot be captured, the current device and stream are
    /// kept.
    pub async fn switch_input_device(
        &mut self,
        device_id: &str,
    ) -> Result<Option<TrackHandle>, MediaError> {
        if self.state.stream.is_none() {
            debug!(device = %device_id, "Input device selected before capture");
            self.state.input_device_id = Some(device_id.to_string());
            return Ok(None);
        }

        let previous = self.state.input_device_id.replace(device_id.to_string());
        match self.acquire_local_stream().await {
            Ok(stream) => {
                info!(device = %device_id, "Input device switched");
                Ok(stream.audio_track().cloned())
            }
            Err(e) => {
                self.state.input_device_id = previous;
                Err(e)
            }
        }
    }

    /// Processing toggles for the next capture.
    pub fn set_constraints(&mut self, constraints: CaptureConstraints) {
        self.state.constraints = constraints;
    }

    // -- mute / push-to-talk -------------------------------------------------

    /// Toggle local audio tracks. Peer sessions are untouched.
    pub fn set_muted(&mut self, muted: bool) {
        self.state.muted = muted;
        if let Some(stream) = &self.state.stream {
            stream.set_audio_enabled(!muted);
        }
        debug!(muted, "Local mute changed");
    }

    /// Enable or disable push-to-talk. Enabling mutes until the key is held.
    ///
    /// Returns the new talking state if it changed.
    pub fn set_push_to_talk(&mut self, enabled: bool) -> Option<bool> {
        self.state.push_to_talk.enabled = enabled;
        self.state.push_to_talk.pressed = false;
        self.set_muted(enabled);
        self.set_talking(false)
    }

    pub fn set_push_to_talk_key(&mut self, key: &str) {
        self.state.push_to_talk.key = key.to_string();
        self.state.push_to_talk.pressed = false;
    }

    /// Returns the new talking state if the key press changed it.
    pub fn key_down(&mut self, key: &str) -> Option<bool> {
        let ptt = &self.state.push_to_talk;
        if !ptt.enabled || ptt.pressed || ptt.key != key {
            return None;
        }
        self.state.push_to_talk.pressed = true;
        self.set_muted(false);
        self.set_talking(true)
    }

    /// Returns the new talking state if the key release changed it.
    pub fn key_up(&mut self, key: &str) -> Option<bool> {
        let ptt = &self.state.push_to_talk;
        if !ptt.enabled || !ptt.pressed || ptt.key != key {
            return None;
        }
        self.state.push_to_talk.pressed = false;
        self.set_muted(true);
        self.set_talking(false)
    }

    /// Returns the new value if it changed.
    pub fn set_talking(&mut self, talking: bool) -> Option<bool> {
        if self.state.talking == talking {
            return None;
        }
        self.state.talking = talking;
        Some(talking)
    }

    pub fn set_level(&mut self, level: u8) {
        self.state.level = level.min(100);
    }

    // -- devices and playback -----------------------------------------------

    /// Enumerate devices, selecting the first of each kind if none is set.
    pub async fn list_devices(&mut self) -> Result<DeviceList, MediaError> {
        let devices = self.backend.enumerate_devices().await?;
        let mut list = DeviceList::default();
        for device in devices {
            match device.kind {
                DeviceKind::AudioInput => list.inputs.push(device),
                DeviceKind::AudioOutput => list.outputs.push(device),
                DeviceKind::VideoInput => {}
            }
        }

        if self.state.input_device_id.is_none() {
            self.state.input_device_id = list.inputs.first().map(|d| d.device_id.clone());
        }
        if self.state.output_device_id.is_none() {
            self.state.output_device_id = list.outputs.first().map(|d| d.device_id.clone());
        }
        Ok(list)
    }

    pub fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            sink_id: self.state.output_device_id.clone(),
            volume: f64::from(self.state.volume) / 100.0,
            muted: self.state.deafened,
        }
    }

    pub fn set_output_device(&mut self, device_id: &str) {
        self.state.output_device_id = Some(device_id.to_string());
        info!(device = %device_id, "Output device switched");
        self.apply_output();
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.state.volume = volume.min(100);
        self.apply_output();
    }

    /// Silence every remote participant. Local capture is unaffected.
    pub fn set_deafened(&mut self, deafened: bool) {
        self.state.deafened = deafened;
        self.apply_output();
    }

    fn apply_output(&self) {
        let output = self.output_settings();
        for participant_id in &self.remote_audio {
            if let Err(e) = self.backend.set_remote_output(participant_id, &output) {
                warn!(participant_id = %participant_id, error = %e, "Failed to update playback");
            }
        }
    }

    pub fn attach_remote_audio(
        &mut self,
        participant_id: &str,
        stream: &MediaStream,
    ) -> Result<(), MediaError> {
        self.backend
            .attach_remote_audio(participant_id, stream, &self.output_settings())?;
        self.remote_audio.insert(participant_id.to_string());
        Ok(())
    }

    pub fn detach_remote_audio(&mut self, participant_id: &str) {
        if self.remote_audio.remove(participant_id) {
            self.backend.detach_remote_audio(participant_id);
        }
    }

    pub fn remote_audio_count(&self) -> usize {
        self.remote_audio.len()
    }

    // -- screen capture ------------------------------------------------------

    pub async fn start_screen_share(&mut self) -> Result<MediaStream, MediaError> {
        if let Some(stream) = &self.screen {
            return Ok(stream.clone());
        }
        let stream = self.backend.get_display_media().await?;
        info!(stream_id = %stream.id, "Screen capture started");
        self.screen = Some(stream.clone());
        Ok(stream)
    }

    /// Returns `false` if nothing was being shared.
    pub fn stop_screen_share(&mut self) -> bool {
        match self.screen.take() {
            Some(stream) => {
                stream.stop_all();
                info!("Screen capture stopped");
                true
            }
            None => false,
        }
    }

    // -- teardown ------------------------------------------------------------

    /// Stop every local track and release remote playback.
    pub fn teardown(&mut self) {
        if let Some(stream) = self.state.stream.take() {
            stream.stop_all();
        }
        self.stop_screen_share();
        let remote: Vec<String> = self.remote_audio.iter().cloned().collect();
        for participant_id in remote {
            self.detach_remote_audio(&participant_id);
        }
        self.state.talking = false;
        self.state.level = 0;
    }

    pub fn live_track_count(&self) -> usize {
        self.state
            .stream
            .iter()
            .chain(self.screen.iter())
            .map(MediaStream::live_track_count)
            .sum()
    }
}
