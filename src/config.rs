use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::smoothing::DEFAULT_SMOOTHING;
use crate::visual::pulse::{DEFAULT_DECAY_RATE, DEFAULT_LOUDNESS_THRESHOLD};

/// Largest MIDI sync correction accepted in either direction, in seconds.
pub const MAX_MIDI_OFFSET: f64 = 5.0;

/// Tunable parameters for one visualizer session.
///
/// Stored as pretty JSON. Missing fields fall back to their defaults so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Number of frequency bands (and object groups). Zero is treated as one.
    pub num_bands: usize,
    /// Fraction of the previous smoothed value retained each frame.
    pub smoothing: f32,
    /// Loudness above which every object flashes.
    pub loudness_threshold: f32,
    /// Pulse lost per tick.
    pub decay_rate: f32,
    /// Added to the playhead when draining MIDI events.
    pub midi_offset_seconds: f64,
    /// How fast displayed pulses chase the raw pulse, per second.
    pub pulse_approach_rate: f32,

    // Analysis graph
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,

    // Scene scale
    pub base_radius: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            num_bands: 32,
            smoothing: DEFAULT_SMOOTHING,
            loudness_threshold: DEFAULT_LOUDNESS_THRESHOLD,
            decay_rate: DEFAULT_DECAY_RATE,
            midi_offset_seconds: 0.0,
            pulse_approach_rate: 8.0,
            fft_size: 2048,
            min_decibels: -100.0,
            max_decibels: -30.0,
            base_radius: 2.2,
        }
    }
}

impl VisualizerConfig {
    /// Band count every component agrees on; never zero.
    pub fn band_count(&self) -> usize {
        self.num_bands.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("smoothing", self.smoothing),
            ("loudness_threshold", self.loudness_threshold),
            ("decay_rate", self.decay_rate),
            ("pulse_approach_rate", self.pulse_approach_rate),
            ("min_decibels", self.min_decibels),
            ("max_decibels", self.max_decibels),
            ("base_radius", self.base_radius),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                bail!("{} must be finite, got {}", name, value);
            }
        }
        if !self.midi_offset_seconds.is_finite() {
            bail!("midi_offset_seconds must be finite");
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            bail!("smoothing must be in [0, 1), got {}", self.smoothing);
        }
        if self.decay_rate < 0.0 {
            bail!("decay_rate must not be negative, got {}", self.decay_rate);
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            bail!("FFT size must be a power of 2 and at least 32, got {}", self.fft_size);
        }
        if self.min_decibels >= self.max_decibels {
            bail!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels,
                self.max_decibels
            );
        }
        Ok(())
    }

    /// Load a config file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub fn clamp_offset(offset: f64) -> f64 {
    if offset.is_finite() {
        offset.clamp(-MAX_MIDI_OFFSET, MAX_MIDI_OFFSET)
    } else {
        0.0
    }
}
