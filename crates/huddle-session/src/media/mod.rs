//! Local capture, device control and the platform media seam.
//!
//! Everything that touches real audio, video or network transport sits
//! behind [`MediaBackend`]. The rest of the crate only sees the
//! capability traits defined in [`backend`].

pub mod backend;
mod controller;

pub use backend::{
    AudioPanner, CaptureConstraints, CaptureRequest, DeviceKind, DistanceModel,
    FrequencyAnalyser, MediaBackend, MediaDeviceInfo, MediaStream, MediaTrack, OutputSettings,
    PannerOptions, PanningModel, PeerConnection, PeerConnectionState, PeerEvent, Position3,
    TrackHandle, TrackKind,
};
pub use controller::{DeviceList, LocalMediaState, MediaController, PushToTalkState};
