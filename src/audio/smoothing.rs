use log::warn;

use super::spectrum::SpectrumFrame;

/// Fraction of the previous smoothed value kept each frame. The remaining
/// `1 - DEFAULT_SMOOTHING` comes from the new raw sample.
pub const DEFAULT_SMOOTHING: f32 = 0.85;

/// Per-band exponential moving average over raw spectrum frames.
pub struct SmoothedSpectrum {
    retain: f32,
    state: Vec<f32>,
}

impl SmoothedSpectrum {
    pub fn new(num_bands: usize) -> Self {
        Self::with_retain(num_bands, DEFAULT_SMOOTHING)
    }

    pub fn with_retain(num_bands: usize, retain: f32) -> Self {
        Self {
            retain: retain.clamp(0.0, 1.0),
            state: vec![0.0; num_bands],
        }
    }

    /// Blend `raw` into the running state and return the new state.
    ///
    /// A frame of a different width replaces the state with zeros first; that
    /// only happens when the band count itself changes.
    pub fn update(&mut self, raw: &SpectrumFrame) -> SpectrumFrame {
        if raw.len() != self.state.len() {
            warn!(
                "Spectrum width changed from {} to {} bands, restarting smoothing",
                self.state.len(),
                raw.len()
            );
            self.state = vec![0.0; raw.len()];
        }

        let blend = 1.0 - self.retain;
        for (smoothed, &value) in self.state.iter_mut().zip(raw.bands.iter()) {
            *smoothed = *smoothed * self.retain + value * blend;
        }

        SpectrumFrame::from(self.state.clone())
    }

    pub fn state(&self) -> &[f32] {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step_blend() {
        let mut smoother = SmoothedSpectrum::new(2);
        let out = smoother.update(&SpectrumFrame::from(vec![1.0, 0.0]));
        assert!((out.bands[0] - 0.15).abs() < 1e-6);
        assert_eq!(out.bands[1], 0.0);

        let out = smoother.update(&SpectrumFrame::from(vec![0.0, 0.0]));
        assert!((out.bands[0] - 0.1275).abs() < 1e-6);
    }

    #[test]
    fn test_converges_without_overshoot() {
        let target = 0.6;
        let mut smoother = SmoothedSpectrum::new(3);
        let raw = SpectrumFrame::from(vec![target; 3]);
        let mut previous = 0.0;

        for _ in 0..200 {
            let out = smoother.update(&raw);
            for &value in &out.bands {
                assert!(value >= previous - 1e-7);
                assert!(value <= target + 1e-6);
            }
            previous = out.bands[0];
        }
        assert!((previous - target).abs() < 1e-4);
    }

    #[test]
    fn test_bands_are_independent() {
        let mut smoother = SmoothedSpectrum::new(3);
        let out = smoother.update(&SpectrumFrame::from(vec![0.0, 1.0, 0.0]));
        assert_eq!(out.bands[0], 0.0);
        assert_eq!(out.bands[2], 0.0);
        assert!(out.bands[1] > 0.0);
    }

    #[test]
    fn test_width_change_restarts() {
        let mut smoother = SmoothedSpectrum::new(2);
        smoother.update(&SpectrumFrame::from(vec![1.0, 1.0]));
        let out = smoother.update(&SpectrumFrame::from(vec![1.0, 1.0, 1.0, 1.0]));
        assert_eq!(out.len(), 4);
        assert!((out.bands[0] - 0.15).abs() < 1e-6);
    }
}
