//! Full configuration validation.
//!
//! Validates numeric ranges, URL schemes and canvas values. Each section
//! has its own function; `validate` calls them all and collects errors
//! into a single `ConfigError`.

mod helpers;


use crate::schema::HuddleConfig;
use huddle_common::ConfigError;

use helpers::{validate_range, validate_range_f64};

/// Drawing tools the canvas understands.
pub const KNOWN_TOOLS: &[&str] = &["pen", "marker", "highlighter", "eraser"];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HuddleConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_signaling(&mut errors, config);
    validate_ice(&mut errors, config);
    validate_audio(&mut errors, config);
    validate_vad(&mut errors, config);
    validate_spatial(&mut errors, config);
    validate_canvas(&mut errors, config);
    validate_relay(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_signaling(errors: &mut Vec<String>, config: &HuddleConfig) {
    let url = &config.signaling.server_url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!(
            "signaling.server_url = {url:?} must start with ws:// or wss://"
        ));
    }
    validate_range(
        errors,
        "signaling.connect_timeout_secs",
        config.signaling.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "signaling.event_buffer",
        config.signaling.event_buffer,
        16,
        65536,
    );
}

fn validate_ice(errors: &mut Vec<String>, config: &HuddleConfig) {
    if config.ice.servers.is_empty() {
        errors.push("ice.servers must list at least one server".into());
    }
    for server in &config.ice.servers {
        let scheme_ok = ["stun:", "stuns:", "turn:", "turns:"]
            .iter()
            .any(|scheme| server.urls.starts_with(scheme));
        if !scheme_ok {
            errors.push(format!("ice.servers url {:?} has an unknown scheme", server.urls));
        }
    }
}

fn validate_audio(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(errors, "audio.volume", config.audio.volume, 0, 100);
    validate_range(
        errors,
        "audio.sample_rate",
        config.audio.sample_rate,
        8000,
        96000,
    );
    validate_range(errors, "audio.channel_count", config.audio.channel_count, 1, 2);
    if config.push_to_talk.key.trim().is_empty() {
        errors.push("push_to_talk.key must not be empty".into());
    }
}

fn validate_vad(errors: &mut Vec<String>, config: &HuddleConfig) {
    let fft = config.vad.fft_size;
    if !fft.is_power_of_two() || !(32..=32768).contains(&fft) {
        errors.push(format!(
            "vad.fft_size = {fft} must be a power of two in [32, 32768]"
        ));
    }
    validate_range(errors, "vad.threshold", config.vad.threshold, 0, 100);
    validate_range(
        errors,
        "vad.frame_interval_ms",
        config.vad.frame_interval_ms,
        1,
        1000,
    );
}

fn validate_spatial(errors: &mut Vec<String>, config: &HuddleConfig) {
    let s = &config.spatial;
    validate_range_f64(errors, "spatial.radius", s.radius, 0.01, 100.0);
    validate_range_f64(errors, "spatial.ref_distance", s.ref_distance, 0.01, 100.0);
    validate_range_f64(errors, "spatial.rolloff_factor", s.rolloff_factor, 0.0, 10.0);
    if s.max_distance < s.ref_distance {
        errors.push(format!(
            "spatial.max_distance = {} is smaller than spatial.ref_distance = {}",
            s.max_distance, s.ref_distance
        ));
    }
}

fn validate_canvas(errors: &mut Vec<String>, config: &HuddleConfig) {
    let c = &config.canvas;
    if !KNOWN_TOOLS.contains(&c.tool.as_str()) {
        errors.push(format!("canvas.tool = {:?} is not a known tool", c.tool));
    }
    if !helpers::is_hex_color(&c.color) {
        errors.push(format!("canvas.color = {:?} is not a #rrggbb color", c.color));
    }
    validate_range(errors, "canvas.brush_size", c.brush_size, 1, 100);
    validate_range(errors, "canvas.eraser_multiplier", c.eraser_multiplier, 1, 10);
    validate_range(errors, "chat.max_messages", config.chat.max_messages, 1, 10000);
}

fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(errors, "relay.port", config.relay.port, 1, 65535);
    validate_range(
        errors,
        "relay.max_participants",
        config.relay.max_participants,
        2,
        64,
    );
}
