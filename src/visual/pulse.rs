use log::debug;

pub const DEFAULT_DECAY_RATE: f32 = 0.02;
pub const DEFAULT_LOUDNESS_THRESHOLD: f32 = 0.75;

/// Pulses below this count as fully decayed. Repeated f32 subtraction leaves
/// a residue of a few ulps that would otherwise never reach zero.
const PULSE_FLOOR: f32 = 1e-4;

/// Per-object transient emphasis, each value in [0, 1].
///
/// Two triggers raise pulses: a loud frame flashes every object to 1.0, and a
/// routed MIDI note raises one object to at least its velocity. Every tick
/// ends with a single decay step.
#[derive(Debug, Clone)]
pub struct PulseEngine {
    pulses: Vec<f32>,
    decay_rate: f32,
    loudness_threshold: f32,
}

impl PulseEngine {
    pub fn new(count: usize, decay_rate: f32, loudness_threshold: f32) -> Self {
        Self {
            pulses: vec![0.0; count],
            decay_rate: decay_rate.max(0.0),
            loudness_threshold,
        }
    }

    pub fn with_defaults(count: usize) -> Self {
        Self::new(count, DEFAULT_DECAY_RATE, DEFAULT_LOUDNESS_THRESHOLD)
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.pulses
    }

    pub fn get(&self, index: usize) -> f32 {
        self.pulses.get(index).copied().unwrap_or(0.0)
    }

    /// Raise one object to at least `velocity`. Never lowers a pulse.
    pub fn hit(&mut self, index: usize, velocity: f32) {
        if let Some(pulse) = self.pulses.get_mut(index) {
            let velocity = if velocity.is_finite() { velocity.clamp(0.0, 1.0) } else { 0.0 };
            *pulse = pulse.max(velocity);
        }
    }

    /// Flash every object when `loudness` is over the threshold. Fires on
    /// every call where the condition holds.
    pub fn surge(&mut self, loudness: f32) -> bool {
        if loudness > self.loudness_threshold && !self.pulses.is_empty() {
            self.pulses.iter_mut().for_each(|p| *p = 1.0);
            true
        } else {
            false
        }
    }

    pub fn decay(&mut self) {
        let rate = self.decay_rate;
        for pulse in &mut self.pulses {
            let next = (*pulse - rate).max(0.0);
            *pulse = if next < PULSE_FLOOR { 0.0 } else { next };
        }
    }

    /// One full tick: MIDI hits, then the loudness flash, then decay.
    ///
    /// A flash therefore overrides any hit in the same tick, and everything
    /// triggered this tick ends one decay step below its trigger value.
    pub fn tick(&mut self, loudness: f32, hits: &[(usize, f32)]) -> bool {
        for &(index, velocity) in hits {
            self.hit(index, velocity);
        }
        let surged = self.surge(loudness);
        if surged {
            debug!("Loudness {:.3} over threshold, flashing {} objects", loudness, self.pulses.len());
        }
        self.decay();
        surged
    }
}

/// What labels and glows actually show: each value chases its raw pulse at a
/// fixed rate instead of snapping to it.
#[derive(Debug, Clone)]
pub struct PulseDisplay {
    values: Vec<f32>,
    approach_rate: f32,
}

impl PulseDisplay {
    pub fn new(count: usize, approach_rate: f32) -> Self {
        Self {
            values: vec![0.0; count],
            approach_rate: approach_rate.max(0.0),
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Move each value `approach_rate * dt` of the way toward its target.
    pub fn update(&mut self, targets: &[f32], dt: f32) {
        if targets.len() != self.values.len() {
            self.values = vec![0.0; targets.len()];
        }
        let step = if dt.is_finite() { (self.approach_rate * dt).clamp(0.0, 1.0) } else { 0.0 };
        for (value, &target) in self.values.iter_mut().zip(targets) {
            *value = (*value + (target - *value) * step).clamp(0.0, 1.0);
        }
    }
}
