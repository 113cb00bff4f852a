//! Audio capture, push-to-talk, voice activity and spatial audio settings.

use serde::{Deserialize, Serialize};

/// Microphone capture and remote playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred input device id; empty selects the first available.
    pub input_device: String,
    /// Preferred output device id; empty selects the first available.
    pub output_device: String,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u32,
    /// Remote playback volume, 0-100.
    pub volume: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: String::new(),
            output_device: String::new(),
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: 48000,
            channel_count: 1,
            volume: 100,
        }
    }
}

/// Push-to-talk settings. `key` is a keyboard `code` such as `Space`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushToTalkConfig {
    pub enabled: bool,
    pub key: String,
}

impl Default for PushToTalkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key: "Space".into(),
        }
    }
}

/// Voice-activity detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Analysis window size; half of it is the number of frequency bins.
    pub fft_size: u32,
    /// Level (0-100) above which the local user counts as talking.
    pub threshold: u32,
    /// Sampling period, one animation frame by default.
    pub frame_interval_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            threshold: 10,
            frame_interval_ms: 16,
        }
    }
}

/// 3D placement of remote voices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub enabled: bool,
    /// Distance of every remote source from the listener.
    pub radius: f64,
    pub ref_distance: f64,
    pub max_distance: f64,
    pub rolloff_factor: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 2.0,
            ref_distance: 1.0,
            max_distance: 10.0,
            rolloff_factor: 1.0,
        }
    }
}
