//! Voice activity detection from an input level meter.
//!
//! Each frame the analyser's byte frequency bins are averaged and scaled
//! to 0..=100. Speech is reported while the level is strictly above the
//! threshold.

use huddle_config::VadConfig;

use crate::media::FrequencyAnalyser;

/// Map byte magnitudes onto a 0..=100 level.
pub fn level_from_bins(bins: &[u8]) -> u8 {
    if bins.is_empty() {
        return 0;
    }
    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    let mean = f64::from(sum) / bins.len() as f64;
    (mean / 255.0 * 100.0).min(100.0) as u8
}

pub struct VoiceActivityDetector {
    analyser: Option<Box<dyn FrequencyAnalyser>>,
    buffer: Vec<u8>,
    threshold: u8,
    fft_size: usize,
}

impl VoiceActivityDetector {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            analyser: None,
            buffer: Vec::new(),
            threshold: config.threshold.min(100) as u8,
            fft_size: config.fft_size as usize,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Start metering a new input. Replaces any previous analyser.
    pub fn attach(&mut self, analyser: Box<dyn FrequencyAnalyser>) {
        self.buffer = vec![0; analyser.frequency_bin_count()];
        self.analyser = Some(analyser);
    }

    pub fn detach(&mut self) {
        self.analyser = None;
        self.buffer.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.analyser.is_some()
    }

    /// Read one frame. Returns 0 when nothing is attached.
    pub fn sample(&mut self) -> u8 {
        match self.analyser.as_mut() {
            Some(analyser) => {
                analyser.byte_frequency_data(&mut self.buffer);
                level_from_bins(&self.buffer)
            }
            None => 0,
        }
    }

    pub fn is_talking(&self, level: u8) -> bool {
        level > self.threshold
    }
}
