//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# server_url = "ws://localhost:3000"
# connect_timeout_secs = 15   # 1-120
# event_buffer = 256          # 16-65536

# STUN only by default. Add a TURN entry (with username/credential)
# to reach peers behind symmetric NATs.
# [[ice.servers]]
# urls = "stun:stun.l.google.com:19302"

[audio]
# input_device = ""           # empty = first microphone
# output_device = ""          # empty = first speaker
# echo_cancellation = true
# noise_suppression = true
# auto_gain_control = true
# sample_rate = 48000
# channel_count = 1
# volume = 100                # 0-100

[push_to_talk]
# enabled = false
# key = "Space"

[vad]
# fft_size = 256              # power of two, 32-32768
# threshold = 10              # 0-100
# frame_interval_ms = 16

[spatial]
# enabled = false
# radius = 2.0
# ref_distance = 1.0
# max_distance = 10.0
# rolloff_factor = 1.0

[canvas]
# tool = "pen"                # pen, marker, highlighter, eraser
# color = "#000000"
# brush_size = 2              # 1-100
# eraser_multiplier = 3

[chat]
# max_messages = 500

[relay]
# port = 3000
# max_participants = 16

[logging]
# level = "info"
"##
    .to_string()
}
