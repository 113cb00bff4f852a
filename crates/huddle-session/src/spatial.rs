//! Places remote voices on a circle around the listener.

use std::collections::HashMap;
use std::f64::consts::PI;

use huddle_common::MediaError;
use huddle_config::SpatialConfig;
use tracing::debug;

use crate::media::{AudioPanner, MediaBackend, PannerOptions, Position3};

/// Position of the `index`-th of `count` participants on a circle of
/// `radius` in the horizontal plane.
pub fn position_for(index: usize, count: usize, radius: f64) -> Position3 {
    let angle = if count == 0 {
        0.0
    } else {
        2.0 * PI * index as f64 / count as f64
    };
    Position3 {
        x: angle.cos() * radius,
        y: 0.0,
        z: angle.sin() * radius,
    }
}

struct Placement {
    panner: Box<dyn AudioPanner>,
    position: Position3,
}

/// One panner per remote participant.
///
/// A participant's position is fixed when it is first attached and is not
/// revisited when the roster later changes.
pub struct SpatialAudioRenderer {
    enabled: bool,
    radius: f64,
    options: PannerOptions,
    placements: HashMap<String, Placement>,
}

impl SpatialAudioRenderer {
    pub fn new(config: &SpatialConfig) -> Self {
        Self {
            enabled: config.enabled,
            radius: config.radius,
            options: PannerOptions::from(config),
            placements: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning spatial audio off releases every panner.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear();
        }
    }

    /// Create and place a panner for `participant_id`.
    ///
    /// Does nothing when disabled or when the participant is already placed.
    pub fn attach(
        &mut self,
        backend: &dyn MediaBackend,
        participant_id: &str,
        index: usize,
        count: usize,
    ) -> Result<(), MediaError> {
        if !self.enabled || self.placements.contains_key(participant_id) {
            return Ok(());
        }
        let mut panner = backend.create_panner(participant_id, &self.options)?;
        let position = position_for(index, count, self.radius);
        panner.set_position(position);
        debug!(
            participant_id = %participant_id,
            x = position.x,
            z = position.z,
            "Spatial position assigned"
        );
        self.placements
            .insert(participant_id.to_string(), Placement { panner, position });
        Ok(())
    }

    pub fn detach(&mut self, participant_id: &str) {
        if let Some(mut placement) = self.placements.remove(participant_id) {
            placement.panner.disconnect();
        }
    }

    pub fn clear(&mut self) {
        for (_, mut placement) in self.placements.drain() {
            placement.panner.disconnect();
        }
    }

    pub fn position_of(&self, participant_id: &str) -> Option<Position3> {
        self.placements.get(participant_id).map(|p| p.position)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}
