use std::path::PathBuf;
use std::sync::Arc;

use huddle_common::{HuddleError, MediaError};
use huddle_config::HuddleConfig;
use tokio::sync::mpsc;

use super::*;
use crate::canvas::{DrawOp, RecordingSurface};
use crate::media::{PeerConnectionState, TrackKind};
use crate::protocol::{SignalingMessage, UserInfo};
use crate::signaling::SignalingCommand;
use crate::testing::{drain, FakeBackend, FakeTrack};

// ---------------------------------------------------------------------------
// Harness: several clients behind an in-memory relay
// ---------------------------------------------------------------------------

struct Client {
    id: String,
    room: RoomController,
    events: mpsc::Receiver<RoomEvent>,
    sent: mpsc::Receiver<SignalingCommand>,
    backend: Arc<FakeBackend>,
    signaling_tx: mpsc::Sender<SignalingEvent>,
    surface: RecordingSurface,
    disconnected: bool,
}

impl Client {
    fn events(&mut self) -> Vec<RoomEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn sessions(&self) -> Vec<String> {
        self.room.peers().participant_ids()
    }

    fn session_ids(&self) -> Vec<huddle_common::SessionId> {
        self.sessions()
            .iter()
            .map(|id| self.room.peers().session_id(id).unwrap().clone())
            .collect()
    }
}

fn user(id: &str) -> UserInfo {
    UserInfo {
        id: id.into(),
        username: format!("user-{id}"),
        avatar: None,
    }
}

async fn client(id: &str, kind: RoomKind, config: HuddleConfig) -> Client {
    client_with(id, kind, config, None).await
}

async fn client_with(
    id: &str,
    kind: RoomKind,
    config: HuddleConfig,
    config_path: Option<PathBuf>,
) -> Client {
    let backend = FakeBackend::new();
    let (signaling, sent) = SignalingChannel::detached("demo", true);
    let (signaling_tx, signaling_rx) = mpsc::channel(16);
    let mut media = MediaController::new(backend.clone(), &config.audio, &config.push_to_talk);
    if kind == RoomKind::VoiceChat {
        media.acquire_local_stream().await.unwrap();
    }
    let surface = RecordingSurface::new();
    let options = JoinOptions::new(
        "demo",
        kind,
        Identity {
            id: id.into(),
            username: format!("user-{id}"),
            avatar_url: None,
        },
    )
    .with_config(config)
    .with_surface(Box::new(surface.clone()));
    let options = match config_path {
        Some(path) => options.with_config_path(path),
        None => options,
    };

    let (room, events) =
        RoomController::from_parts(options, backend.clone(), signaling, signaling_rx, media);
    Client {
        id: id.into(),
        room,
        events,
        sent,
        backend,
        signaling_tx,
        surface,
        disconnected: false,
    }
}

struct Relay {
    kind: RoomKind,
    config: HuddleConfig,
    clients: Vec<Client>,
}

impl Relay {
    fn new(kind: RoomKind) -> Self {
        Self::with_config(kind, HuddleConfig::default())
    }

    fn with_config(kind: RoomKind, config: HuddleConfig) -> Self {
        Self {
            kind,
            config,
            clients: Vec::new(),
        }
    }

    fn get(&mut self, id: &str) -> &mut Client {
        self.clients.iter_mut().find(|c| c.id == id).unwrap()
    }

    async fn join(&mut self, id: &str) {
        let client = client(id, self.kind, self.config.clone()).await;
        self.clients.push(client);

        let roster: Vec<UserInfo> = self.clients.iter().map(|c| user(&c.id)).collect();
        for c in self.clients.iter_mut() {
            if c.id == id {
                c.room
                    .handle_message(SignalingMessage::Participants {
                        participants: roster.clone(),
                    })
                    .await;
            } else {
                c.room
                    .handle_message(SignalingMessage::UserJoined { user: user(id) })
                    .await;
            }
        }
        self.route().await;
    }

    async fn leave(&mut self, id: &str) {
        let pos = self.clients.iter().position(|c| c.id == id).unwrap();
        let mut gone = self.clients.remove(pos);
        gone.room.leave().await;
        for c in self.clients.iter_mut() {
            c.room
                .handle_message(SignalingMessage::UserLeft {
                    user_id: id.into(),
                    username: Some(format!("user-{id}")),
                })
                .await;
        }
        self.route().await;
    }

    /// Deliver everything clients have written until the room is quiet.
    async fn route(&mut self) {
        loop {
            let mut outgoing = Vec::new();
            for c in self.clients.iter_mut() {
                let drained = drain(&mut c.sent);
                c.disconnected |= drained.disconnected;
                for message in drained.messages {
                    outgoing.push((c.id.clone(), message));
                }
            }
            if outgoing.is_empty() {
                break;
            }
            for (from, mut message) in outgoing {
                message.stamp_sender(&from);
                if message.is_targeted() {
                    let target = message.target_id().map(str::to_string);
                    if let Some(c) = self.clients.iter_mut().find(|c| Some(&c.id) == target.as_ref())
                    {
                        c.room.handle_message(message).await;
                    }
                } else {
                    for c in self.clients.iter_mut().filter(|c| c.id != from) {
                        c.room.handle_message(message.clone()).await;
                    }
                }
            }
        }
    }

    /// Drop messages written so far without delivering them.
    fn discard(&mut self) -> Vec<(String, Vec<SignalingMessage>)> {
        self.clients
            .iter_mut()
            .map(|c| (c.id.clone(), drain(&mut c.sent).messages))
            .collect()
    }
}

fn sent_tags(sent: &[(String, Vec<SignalingMessage>)]) -> Vec<&'static str> {
    sent.iter()
        .flat_map(|(_, msgs)| msgs.iter().map(SignalingMessage::tag))
        .collect()
}

// ---------------------------------------------------------------------------
// Voice rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_way_voice_forms_full_mesh() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    relay.join("c").await;

    assert_eq!(relay.get("a").sessions(), vec!["b", "c"]);
    assert_eq!(relay.get("b").sessions(), vec!["a", "c"]);
    assert_eq!(relay.get("c").sessions(), vec!["a", "b"]);

    for c in &relay.clients {
        assert_eq!(c.backend.open_peer_count(), 2);
        assert_eq!(c.backend.connection_count(), 2);
        for pid in c.sessions() {
            let session = c.room.peers().session(&pid).unwrap();
            assert_eq!(session.state(), crate::peer::NegotiationState::Connected);
        }
    }
}

#[tokio::test]
async fn mesh_holds_for_larger_rooms() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    let ids = ["a", "b", "c", "d", "e"];
    for id in ids {
        relay.join(id).await;
    }
    let n = ids.len();
    let total: usize = relay.clients.iter().map(|c| c.sessions().len()).sum();
    assert_eq!(total, n * (n - 1));
    for c in &relay.clients {
        assert_eq!(c.backend.connection_count(), n - 1);
    }
}

#[tokio::test]
async fn trickled_candidates_reach_the_peer() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;

    let a = relay.get("a");
    let sid = a.room.peers().session_id("b").unwrap().clone();
    let record = a.backend.peer(&sid);
    assert_eq!(record.remote_descriptions.len(), 1);

    let candidate = crate::protocol::IceCandidate::new("candidate:1 1 udp 1 10.0.0.2 9 typ host");
    let b = relay.get("b");
    let b_sid = b.room.peers().session_id("a").unwrap().clone();
    b.room
        .handle_peer_event(PeerEvent::IceCandidate {
            participant_id: "a".into(),
            session_id: b_sid,
            candidate: candidate.clone(),
        })
        .await;
    relay.route().await;
    assert_eq!(relay.get("a").backend.peer(&sid).candidates, vec![candidate]);
}

#[tokio::test]
async fn mute_keeps_sessions_and_sends_no_negotiation() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    let a = relay.get("a");
    let before = a.session_ids();
    let track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();

    a.room.handle_input(LocalInput::SetMuted(true)).await.unwrap();
    assert!(!track.is_enabled());
    assert!(track.is_live());
    a.room.handle_input(LocalInput::ToggleMute).await.unwrap();
    assert!(track.is_enabled());

    assert_eq!(a.session_ids(), before);
    let sent = relay.discard();
    let tags = sent_tags(&sent);
    assert!(!tags.contains(&"offer"));
    assert!(!tags.contains(&"answer"));
}

#[tokio::test]
async fn device_switch_replaces_track_on_every_session() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    let a = relay.get("a");
    let before = a.session_ids();
    let old_track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();
    let analysers = a.backend.analysers_created();

    a.room
        .handle_input(LocalInput::SelectInputDevice("usb-mic".into()))
        .await
        .unwrap();

    let new_track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();
    assert_ne!(new_track.id(), old_track.id());
    assert!(!old_track.is_live());
    assert_eq!(new_track.device_id(), Some("usb-mic"));
    assert_eq!(a.session_ids(), before);
    for sid in &before {
        let record = a.backend.peer(sid);
        assert_eq!(record.replaced, vec![new_track.id().to_string()]);
        assert_eq!(record.local_descriptions.len(), 1);
    }
    assert_eq!(a.backend.analysers_created(), analysers + 1);

    let sent = relay.discard();
    let tags = sent_tags(&sent);
    assert!(!tags.contains(&"offer") && !tags.contains(&"answer"));
}

#[tokio::test]
async fn noise_suppression_off_then_device_switch_keeps_sessions() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    relay.discard();
    let a = relay.get("a");
    let before = a.session_ids();

    a.room
        .handle_input(LocalInput::SetNoiseSuppression(false))
        .await
        .unwrap();
    assert_eq!(a.backend.capture_requests().len(), 1);
    a.room
        .handle_input(LocalInput::SelectInputDevice("usb-mic".into()))
        .await
        .unwrap();

    let request = a.backend.capture_requests().pop().unwrap();
    assert_eq!(request.device_id.as_deref(), Some("usb-mic"));
    assert!(!request.constraints.noise_suppression);
    assert!(request.constraints.echo_cancellation);
    assert_eq!(a.session_ids(), before);
    let new_track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();
    for sid in &before {
        assert_eq!(a.backend.peer(sid).replaced, vec![new_track.id().to_string()]);
    }

    let sent = relay.discard();
    let tags = sent_tags(&sent);
    assert!(!tags.contains(&"offer") && !tags.contains(&"answer"));
}

#[tokio::test]
async fn failed_device_switch_keeps_microphone_usable() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    let a = relay.get("a");
    let b_sid = a.room.peers().session_id("b").unwrap().clone();
    let mic = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();

    a.backend.deny_capture();
    let err = a
        .room
        .handle_input(LocalInput::SelectInputDevice("usb-mic".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, HuddleError::Media(MediaError::PermissionDenied(_))));
    assert!(mic.is_live());
    assert_eq!(a.room.media().live_track_count(), 1);
    assert!(a.backend.peer(&b_sid).replaced.is_empty());
    a.backend.allow_capture();

    // Late joiners still get the working microphone.
    relay.join("c").await;
    let a = relay.get("a");
    let c_sid = a.room.peers().session_id("c").unwrap().clone();
    assert_eq!(
        a.backend.peer(&c_sid).senders,
        vec![(TrackKind::Audio, mic.id().to_string())]
    );

    // And a retry swaps the track everywhere.
    a.room
        .handle_input(LocalInput::SelectInputDevice("usb-mic".into()))
        .await
        .unwrap();
    let new_track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();
    assert_eq!(new_track.device_id(), Some("usb-mic"));
    assert!(!mic.is_live());
    for sid in [&b_sid, &c_sid] {
        assert_eq!(a.backend.peer(sid).replaced, vec![new_track.id().to_string()]);
    }
}

#[tokio::test]
async fn preferences_are_saved_to_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut a = client_with(
        "a",
        RoomKind::VoiceChat,
        HuddleConfig::default(),
        Some(path.clone()),
    )
    .await;

    for input in [
        LocalInput::SetNoiseSuppression(false),
        LocalInput::SelectInputDevice("usb-mic".into()),
        LocalInput::SelectOutputDevice("speakers".into()),
        LocalInput::SetVolume(40),
        LocalInput::SetPushToTalkKey("KeyV".into()),
    ] {
        a.room.handle_input(input).await.unwrap();
    }

    let saved = huddle_config::load_from_path(&path).unwrap();
    assert_eq!(saved.audio.input_device, "usb-mic");
    assert_eq!(saved.audio.output_device, "speakers");
    assert_eq!(saved.audio.volume, 40);
    assert!(!saved.audio.noise_suppression);
    assert!(saved.audio.echo_cancellation);
    assert_eq!(saved.push_to_talk.key, "KeyV");
}

#[tokio::test]
async fn full_event_queue_does_not_stall_the_room() {
    let mut config = HuddleConfig::default();
    config.signaling.event_buffer = 1;
    let mut relay = Relay::with_config(RoomKind::VoiceChat, config);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }

    assert_eq!(relay.get("a").sessions(), vec!["b", "c"]);
    assert_eq!(relay.get("c").sessions(), vec!["a", "b"]);
    let events = relay.get("a").events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], RoomEvent::RosterChanged { .. }));
}

#[tokio::test]
async fn leaving_participant_is_closed_everywhere() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    let b_sid_at_a = relay.get("a").room.peers().session_id("b").unwrap().clone();

    relay.leave("b").await;

    let a = relay.get("a");
    assert_eq!(a.sessions(), vec!["c"]);
    assert!(a.backend.peer(&b_sid_at_a).closed);
    assert!(a.room.participants().iter().all(|p| p.id != "b"));
    let left = a
        .events()
        .into_iter()
        .any(|e| matches!(e, RoomEvent::ParticipantLeft(p) if p.id == "b"));
    assert!(left);
    assert_eq!(relay.get("c").sessions(), vec!["a"]);
}

#[tokio::test]
async fn leave_releases_everything_in_order() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    let a = relay.get("a");
    let track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();

    a.room.leave().await;

    assert!(a.room.is_closed());
    assert!(a.room.peers().is_empty());
    assert_eq!(a.room.media().live_track_count(), 0);
    assert!(!track.is_live());
    assert_eq!(a.backend.open_peer_count(), 0);
    assert!(!a.room.signaling().is_connected().await);
    assert!(drain(&mut a.sent).disconnected);
    assert!(a.events().iter().any(|e| matches!(e, RoomEvent::Left)));

    // A second leave is a no-op.
    a.room.leave().await;
    assert!(a.events().is_empty());
}

#[tokio::test]
async fn transport_loss_tears_room_down() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    let a = relay.get("a");

    a.room.handle_signaling_event(SignalingEvent::Disconnected).await;
    assert!(a.room.is_closed());
    assert!(a.room.peers().is_empty());
    assert_eq!(a.room.media().live_track_count(), 0);
    assert!(a.events().iter().any(|e| matches!(e, RoomEvent::Left)));

    a.room
        .handle_message(SignalingMessage::UserJoined { user: user("z") })
        .await;
    assert!(a.room.peers().is_empty());
}

#[tokio::test]
async fn vad_broadcasts_transitions_only() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    relay.discard();
    let a = relay.get("a");

    a.backend.set_input_magnitude(128);
    a.room.tick().await;
    a.room.tick().await;
    assert_eq!(a.room.media().state().level, 50);

    a.backend.set_input_magnitude(0);
    a.room.tick().await;
    a.room.tick().await;

    let sent = drain(&mut a.sent);
    let talking: Vec<bool> = sent
        .messages
        .iter()
        .filter_map(|m| match m {
            SignalingMessage::VoiceActivity { is_talking, .. } => Some(*is_talking),
            _ => None,
        })
        .collect();
    assert_eq!(talking, vec![true, false]);
}

#[tokio::test]
async fn muted_input_reads_as_silence() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    let a = relay.get("a");
    a.room.handle_input(LocalInput::SetMuted(true)).await.unwrap();
    a.backend.set_input_magnitude(255);
    a.room.tick().await;
    assert_eq!(a.room.media().state().level, 0);
    assert!(!a.room.media().is_talking());
    assert_eq!(drain(&mut a.sent).count("voice-activity"), 0);
}

#[tokio::test]
async fn push_to_talk_talking_iff_key_held() {
    let mut config = HuddleConfig::default();
    config.push_to_talk.enabled = true;
    let mut relay = Relay::with_config(RoomKind::VoiceChat, config);
    relay.join("a").await;
    relay.join("b").await;
    relay.discard();

    let a = relay.get("a");
    let track = a.room.media().local_stream().unwrap().audio_track().unwrap().clone();
    assert!(!track.is_enabled());

    // Loud input without the key does not count as talking.
    a.backend.set_input_magnitude(255);
    a.room.tick().await;
    assert!(!a.room.media().is_talking());

    a.room.handle_input(LocalInput::KeyDown("Space".into())).await.unwrap();
    assert!(a.room.media().is_talking());
    assert!(track.is_enabled());
    a.room.handle_input(LocalInput::KeyDown("Space".into())).await.unwrap();

    // Silence while held does not end talking.
    a.backend.set_input_magnitude(0);
    a.room.tick().await;
    assert!(a.room.media().is_talking());

    a.room.handle_input(LocalInput::KeyUp("Space".into())).await.unwrap();
    assert!(!a.room.media().is_talking());
    assert!(!track.is_enabled());

    let sent = drain(&mut a.sent);
    assert_eq!(sent.count("voice-activity"), 2);
    relay.route().await;
}

#[tokio::test]
async fn remote_voice_activity_updates_roster() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    relay.get("a").events();

    relay.get("b").backend.set_input_magnitude(200);
    relay.get("b").room.tick().await;
    relay.route().await;

    let a = relay.get("a");
    assert!(a.room.participants().iter().any(|p| p.id == "b" && p.talking));
    assert!(a.events().iter().any(|e| matches!(
        e,
        RoomEvent::TalkingChanged { participant_id, talking: true } if participant_id == "b"
    )));
}

#[tokio::test]
async fn remote_stream_plays_through_spatial_panner() {
    let mut config = HuddleConfig::default();
    config.spatial.enabled = true;
    let mut relay = Relay::with_config(RoomKind::VoiceChat, config);
    relay.join("a").await;
    relay.join("b").await;
    relay.join("c").await;

    let a = relay.get("a");
    for pid in ["b", "c"] {
        let sid = a.room.peers().session_id(pid).unwrap().clone();
        a.room
            .handle_peer_event(PeerEvent::RemoteTrack {
                participant_id: pid.into(),
                session_id: sid,
                stream: MediaStream::new(vec![FakeTrack::audio("remote")]),
            })
            .await;
    }
    assert!(a.backend.remote_output("b").is_some());
    // Roster is a, b, c: b sits a third of the way round.
    let pos = a.room.spatial().position_of("b").unwrap();
    let angle = 2.0 * std::f64::consts::PI / 3.0;
    assert!((pos.x - angle.cos() * 2.0).abs() < 1e-9);
    assert!((pos.z - angle.sin() * 2.0).abs() < 1e-9);
    assert_eq!(a.backend.panner_positions("c").len(), 1);

    a.room
        .handle_input(LocalInput::SetDeafened(true))
        .await
        .unwrap();
    assert!(a.backend.remote_output("b").unwrap().muted);
    assert!(a.room.media().local_stream().unwrap().audio_track().unwrap().is_enabled());

    relay.leave("b").await;
    let a = relay.get("a");
    assert!(a.backend.remote_output("b").is_none());
    assert!(a.backend.panner_disconnected("b"));
    // c keeps its original placement.
    assert_eq!(a.backend.panner_positions("c").len(), 1);
}

#[tokio::test]
async fn peer_failure_is_reported_not_retried() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    relay.join("b").await;
    relay.get("a").events();
    let a = relay.get("a");
    let sid = a.room.peers().session_id("b").unwrap().clone();

    a.room
        .handle_peer_event(PeerEvent::StateChanged {
            participant_id: "b".into(),
            session_id: sid,
            state: PeerConnectionState::Failed,
        })
        .await;

    assert!(a.events().iter().any(|e| matches!(
        e,
        RoomEvent::PeerFailed { participant_id } if participant_id == "b"
    )));
    assert_eq!(a.backend.connection_count(), 1);
    assert_eq!(drain(&mut a.sent).count("offer"), 0);
}

#[tokio::test]
async fn messages_from_unknown_participants_are_ignored() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    let a = relay.get("a");
    a.room
        .handle_message(SignalingMessage::Offer {
            room_id: "demo".into(),
            target_id: Some("a".into()),
            from_id: Some("intruder".into()),
            offer: crate::protocol::SessionDescription::offer("x"),
        })
        .await;
    a.room
        .handle_message(SignalingMessage::Offer {
            room_id: "demo".into(),
            target_id: Some("a".into()),
            from_id: None,
            offer: crate::protocol::SessionDescription::offer("x"),
        })
        .await;
    assert!(a.room.peers().is_empty());
    assert_eq!(drain(&mut a.sent).count("answer"), 0);
}

#[tokio::test]
async fn join_aborts_when_microphone_is_denied() {
    let backend = FakeBackend::new();
    backend.deny_capture();
    let options = JoinOptions::new("demo", RoomKind::VoiceChat, Identity::with_id("a", "alice"));
    let result = RoomController::join(options, backend.clone()).await;
    match result {
        Err(HuddleError::Media(MediaError::PermissionDenied(_))) => {}
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("join should fail"),
    }
    assert_eq!(backend.connection_count(), 0);
    assert_eq!(backend.capture_requests().len(), 1);
}

#[tokio::test]
async fn run_loop_processes_events_until_leave() {
    let mut c = client("a", RoomKind::VoiceChat, HuddleConfig::default()).await;
    let (input_tx, input_rx) = mpsc::channel(8);
    let signaling_tx = c.signaling_tx.clone();
    let backend = c.backend.clone();

    signaling_tx.send(SignalingEvent::Connected).await.unwrap();
    signaling_tx
        .send(SignalingEvent::Message(SignalingMessage::Participants {
            participants: vec![user("a"), user("b")],
        }))
        .await
        .unwrap();
    signaling_tx
        .send(SignalingEvent::Message(SignalingMessage::UserJoined { user: user("c") }))
        .await
        .unwrap();
    input_tx.send(LocalInput::SetMuted(true)).await.unwrap();
    input_tx.send(LocalInput::Leave).await.unwrap();

    let room = c.room;
    tokio::spawn(room.run(input_rx)).await.unwrap();

    let mut events = Vec::new();
    while let Ok(e) = c.events.try_recv() {
        events.push(e);
    }
    assert!(matches!(events.first(), Some(RoomEvent::Joined { .. })));
    assert!(matches!(events.last(), Some(RoomEvent::Left)));
    let sent = drain(&mut c.sent);
    assert_eq!(sent.count("offer"), 1);
    assert!(sent.disconnected);
    assert_eq!(backend.open_peer_count(), 0);
}

// ---------------------------------------------------------------------------
// Collaboration rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn viewers_never_initiate() {
    let mut relay = Relay::new(RoomKind::Collaboration);
    for id in ["a", "b", "c"] {
        relay.join(id).await;
    }
    for c in &relay.clients {
        assert!(c.sessions().is_empty());
        assert_eq!(c.backend.connection_count(), 0);
        assert!(c.room.media().local_stream().is_none());
    }
}

#[tokio::test]
async fn sharer_offers_to_every_viewer_and_late_joiners() {
    let mut relay = Relay::new(RoomKind::Collaboration);
    for id in ["s", "v1", "v2"] {
        relay.join(id).await;
    }
    relay
        .get("s")
        .room
        .handle_input(LocalInput::StartScreenShare)
        .await
        .unwrap();
    relay.route().await;

    assert_eq!(relay.get("s").sessions(), vec!["v1", "v2"]);
    assert_eq!(relay.get("v1").sessions(), vec!["s"]);
    let s = relay.get("s");
    let sid = s.room.peers().session_id("v1").unwrap().clone();
    let record = s.backend.peer(&sid);
    assert_eq!(record.senders.len(), 1);
    assert_eq!(record.senders[0].0, TrackKind::Video);

    let v1_first = relay.get("v1").room.peers().session_id("s").unwrap().clone();

    relay.join("v3").await;
    assert_eq!(relay.get("s").sessions(), vec!["v1", "v2", "v3"]);
    assert_eq!(relay.get("v3").sessions(), vec!["s"]);
    assert!(relay.get("v3").room.peers().session("v1").is_none());

    relay
        .get("s")
        .room
        .handle_input(LocalInput::StopScreenShare)
        .await
        .unwrap();
    let s = relay.get("s");
    assert!(s.sessions().is_empty());
    assert_eq!(s.room.media().live_track_count(), 0);
    assert!(s
        .events()
        .iter()
        .any(|e| matches!(e, RoomEvent::ScreenShareStopped)));

    // Sharing again reaches viewers on fresh connections, never on the
    // ones left over from the first share.
    relay
        .get("s")
        .room
        .handle_input(LocalInput::StartScreenShare)
        .await
        .unwrap();
    relay.route().await;
    assert_eq!(relay.get("s").sessions(), vec!["v1", "v2", "v3"]);
    let v1 = relay.get("v1");
    assert_eq!(v1.sessions(), vec!["s"]);
    let v1_second = v1.room.peers().session_id("s").unwrap().clone();
    assert_ne!(v1_second, v1_first);
    assert!(v1.backend.peer(&v1_first).closed);
    let record = v1.backend.peer(&v1_second);
    assert_eq!(record.remote_descriptions.len(), 1);
    assert_eq!(v1.backend.open_peer_count(), 1);
}

#[tokio::test]
async fn screen_share_is_rejected_in_voice_rooms() {
    let mut relay = Relay::new(RoomKind::VoiceChat);
    relay.join("a").await;
    let err = relay
        .get("a")
        .room
        .handle_input(LocalInput::StartScreenShare)
        .await
        .unwrap_err();
    assert!(matches!(err, HuddleError::Media(MediaError::NotSupported(_))));
}

#[tokio::test]
async fn canvas_strokes_replay_identically() {
    let mut relay = Relay::new(RoomKind::Collaboration);
    relay.join("a").await;
    relay.join("b").await;
    relay.join("c").await;

    let a = relay.get("a");
    a.room
        .handle_input(LocalInput::SetColor("#ff0000".into()))
        .await
        .unwrap();
    a.room
        .handle_input(LocalInput::SetBrushSize(4.0))
        .await
        .unwrap();
    a.room
        .handle_input(LocalInput::PointerDown(StrokePoint::new(0.0, 0.0)))
        .await
        .unwrap();
    for i in 1..5 {
        let f = f64::from(i);
        a.room
            .handle_input(LocalInput::PointerMove(StrokePoint::new(f * 3.0, f * 2.0)))
            .await
            .unwrap();
    }
    a.room.handle_input(LocalInput::PointerUp).await.unwrap();
    a.room
        .handle_input(LocalInput::SetTool(Tool::Eraser))
        .await
        .unwrap();
    a.room
        .handle_input(LocalInput::PointerDown(StrokePoint::new(5.0, 5.0)))
        .await
        .unwrap();
    a.room
        .handle_input(LocalInput::PointerMove(StrokePoint::new(6.0, 6.0)))
        .await
        .unwrap();
    a.room.handle_input(LocalInput::PointerUp).await.unwrap();
    relay.route().await;

    let local = relay.get("a").surface.ops();
    assert_eq!(local.iter().filter(|op| **op == DrawOp::Stroke).count(), 5);
    assert_eq!(relay.get("b").surface.ops(), local);
    assert_eq!(relay.get("c").surface.ops(), local);

    relay
        .get("b")
        .room
        .handle_input(LocalInput::ClearCanvas)
        .await
        .unwrap();
    relay.route().await;
    for id in ["a", "b", "c"] {
        assert!(relay.get(id).surface.is_blank());
    }
}

#[tokio::test]
async fn chat_and_membership_notices() {
    let mut relay = Relay::new(RoomKind::Collaboration);
    relay.join("a").await;
    relay.join("b").await;

    relay
        .get("b")
        .room
        .handle_input(LocalInput::SendChat("  hello there  ".into()))
        .await
        .unwrap();
    relay
        .get("b")
        .room
        .handle_input(LocalInput::SendChat("   ".into()))
        .await
        .unwrap();
    relay.route().await;

    relay.leave("b").await;

    let a = relay.get("a");
    let history: Vec<(bool, String)> = a
        .room
        .chat()
        .all()
        .iter()
        .map(|m| (m.system, m.content.clone()))
        .collect();
    assert_eq!(
        history,
        vec![
            (true, "user-b joined the room".to_string()),
            (false, "hello there".to_string()),
            (true, "user-b left the room".to_string()),
        ]
    );
    let from_b = &a.room.chat().all()[1];
    assert_eq!(from_b.username, "user-b");
}
