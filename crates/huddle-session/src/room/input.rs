//! Local input and the VAD frame clock.

use huddle_common::{HuddleError, MediaError};
use huddle_config::HuddleConfig;
use tracing::{debug, info, warn};

use super::{LocalInput, RoomController, RoomEvent};
use crate::chat::{normalize_outgoing, ChatMessage};
use crate::media::CaptureConstraints;
use crate::protocol::{DrawEvent, RoomKind, SignalingMessage};

impl RoomController {
    pub async fn handle_input(&mut self, input: LocalInput) -> Result<(), HuddleError> {
        if self.closed {
            return Ok(());
        }

        match input {
            LocalInput::SetMuted(muted) => self.media.set_muted(muted),
            LocalInput::ToggleMute => {
                let muted = !self.media.is_muted();
                self.media.set_muted(muted);
            }
            LocalInput::KeyDown(key) => {
                if let Some(talking) = self.media.key_down(&key) {
                    self.broadcast_talking(talking).await;
                }
            }
            LocalInput::KeyUp(key) => {
                if let Some(talking) = self.media.key_up(&key) {
                    self.broadcast_talking(talking).await;
                }
            }
            LocalInput::SetPushToTalk(enabled) => {
                if let Some(talking) = self.media.set_push_to_talk(enabled) {
                    self.broadcast_talking(talking).await;
                }
                self.remember(|c| c.push_to_talk.enabled = enabled);
            }
            LocalInput::SetPushToTalkKey(key) => {
                self.media.set_push_to_talk_key(&key);
                self.remember(|c| c.push_to_talk.key = key);
            }

            LocalInput::SetConstraints(constraints) => self.set_constraints(constraints),
            LocalInput::SetNoiseSuppression(enabled) => {
                let mut constraints = self.media.state().constraints.clone();
                constraints.noise_suppression = enabled;
                self.set_constraints(constraints);
            }
            LocalInput::SetEchoCancellation(enabled) => {
                let mut constraints = self.media.state().constraints.clone();
                constraints.echo_cancellation = enabled;
                self.set_constraints(constraints);
            }
            LocalInput::SelectInputDevice(device_id) => {
                self.switch_input(&device_id).await?;
                self.remember(|c| c.audio.input_device = device_id);
            }
            LocalInput::SelectOutputDevice(device_id) => {
                self.media.set_output_device(&device_id);
                self.remember(|c| c.audio.output_device = device_id);
            }
            LocalInput::SetVolume(volume) => {
                self.media.set_volume(volume);
                let volume = u32::from(self.media.state().volume);
                self.remember(|c| c.audio.volume = volume);
            }
            LocalInput::SetDeafened(deafened) => self.media.set_deafened(deafened),
            LocalInput::SetSpatialAudio(enabled) => self.set_spatial(enabled),

            LocalInput::StartScreenShare => self.start_screen_share().await?,
            LocalInput::StopScreenShare => self.stop_screen_share().await,

            LocalInput::PointerDown(point) => {
                let event = self.canvas.pointer_down(point);
                self.send_draw(event).await;
            }
            LocalInput::PointerMove(point) => {
                if let Some(event) = self.canvas.pointer_move(point) {
                    self.send_draw(event).await;
                }
            }
            LocalInput::PointerUp => {
                if let Some(event) = self.canvas.pointer_up() {
                    self.send_draw(event).await;
                }
            }
            LocalInput::SetTool(tool) => self.canvas.set_tool(tool),
            LocalInput::SetColor(color) => self.canvas.set_color(&color),
            LocalInput::SetBrushSize(size) => self.canvas.set_brush_size(size),
            LocalInput::ClearCanvas => {
                self.canvas.clear();
                self.signaling
                    .send(&SignalingMessage::ClearCanvas {
                        room_id: self.room_id.clone(),
                    })
                    .await;
            }

            LocalInput::SendChat(text) => self.send_chat(&text).await,

            LocalInput::Leave => self.leave().await,
        }
        Ok(())
    }

    /// One VAD frame. Muted input reads as silence; only transitions of
    /// the talking flag are broadcast. Push-to-talk overrides detection.
    pub async fn tick(&mut self) {
        if self.closed || self.kind != RoomKind::VoiceChat {
            return;
        }
        let level = if self.media.is_muted() {
            0
        } else {
            self.vad.sample()
        };
        self.media.set_level(level);

        if self.media.push_to_talk_enabled() {
            return;
        }
        if let Some(talking) = self.media.set_talking(self.vad.is_talking(level)) {
            self.broadcast_talking(talking).await;
        }
    }

    async fn broadcast_talking(&mut self, talking: bool) {
        self.signaling
            .send(&SignalingMessage::VoiceActivity {
                room_id: self.room_id.clone(),
                is_talking: talking,
                user_id: None,
            })
            .await;
        self.membership.set_talking(&self.identity.id, talking);
        self.emit(RoomEvent::TalkingChanged {
            participant_id: self.identity.id.clone(),
            talking,
        });
    }

    /// Apply a preference change and save it when a config file is set.
    fn remember(&mut self, update: impl FnOnce(&mut HuddleConfig)) {
        update(&mut self.config);
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = huddle_config::save_config_to_path(&self.config, path) {
            warn!(path = %path.display(), error = %e, "Failed to save preferences");
        }
    }

    /// Takes effect on the next capture, e.g. a device switch.
    fn set_constraints(&mut self, constraints: CaptureConstraints) {
        let CaptureConstraints {
            echo_cancellation,
            noise_suppression,
            auto_gain_control,
            ..
        } = constraints;
        self.media.set_constraints(constraints);
        self.remember(|c| {
            c.audio.echo_cancellation = echo_cancellation;
            c.audio.noise_suppression = noise_suppression;
            c.audio.auto_gain_control = auto_gain_control;
        });
    }

    /// Recapture on another device and swap the track on every sender.
    /// Sessions keep their identity; nothing is renegotiated.
    async fn switch_input(&mut self, device_id: &str) -> Result<(), HuddleError> {
        let Some(track) = self.media.switch_input_device(device_id).await? else {
            return Ok(());
        };
        let replaced = self.peers.replace_audio_track(&track);
        info!(device = %device_id, sessions = replaced, "Input track replaced");
        self.attach_vad();
        Ok(())
    }

    fn set_spatial(&mut self, enabled: bool) {
        self.spatial.set_enabled(enabled);
        if !enabled {
            return;
        }
        let count = self.membership.len();
        for participant_id in self.peers.participant_ids() {
            let index = self.membership.index_of(&participant_id).unwrap_or(count);
            if let Err(e) =
                self.spatial
                    .attach(self.backend.as_ref(), &participant_id, index, count)
            {
                debug!(participant_id = %participant_id, error = %e, "Spatial audio failed");
            }
        }
    }

    async fn start_screen_share(&mut self) -> Result<(), HuddleError> {
        if self.kind != RoomKind::Collaboration {
            return Err(MediaError::NotSupported("screen share outside collaboration rooms".into()).into());
        }
        if self.sharing {
            return Ok(());
        }
        self.media.start_screen_share().await?;
        self.sharing = true;
        let actions = self.membership.start_sharing();
        self.apply_actions(actions).await;
        self.emit(RoomEvent::ScreenShareStarted);
        Ok(())
    }

    async fn stop_screen_share(&mut self) {
        if !self.sharing {
            return;
        }
        self.sharing = false;
        self.media.stop_screen_share();
        let actions = self.membership.stop_sharing();
        self.apply_actions(actions).await;
        self.emit(RoomEvent::ScreenShareStopped);
    }

    async fn send_draw(&mut self, event: DrawEvent) {
        if self.kind != RoomKind::Collaboration {
            return;
        }
        self.signaling
            .send(&SignalingMessage::draw(&self.room_id, event))
            .await;
    }

    async fn send_chat(&mut self, text: &str) {
        let Some(text) = normalize_outgoing(text) else {
            return;
        };
        let user = self.identity.to_user_info();
        self.signaling
            .send(&SignalingMessage::Chat {
                room_id: self.room_id.clone(),
                message: text.to_string(),
                user: user.clone(),
            })
            .await;
        let msg = ChatMessage::from_user(&user, text);
        self.chat.push(msg.clone());
        self.emit(RoomEvent::Chat(msg));
    }
}
