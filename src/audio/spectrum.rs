use log::{debug, info};

use super::source::{MagnitudeAnalyzer, SignalSource};
use crate::config::VisualizerConfig;

/// One normalized energy value per band, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumFrame {
    pub bands: Vec<f32>,
}

impl SpectrumFrame {
    pub fn zeros(num_bands: usize) -> Self {
        Self {
            bands: vec![0.0; num_bands],
        }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Energy of `band`, or silence for an index outside the frame.
    pub fn energy(&self, band: usize) -> f32 {
        self.bands.get(band).copied().unwrap_or(0.0)
    }
}

impl From<Vec<f32>> for SpectrumFrame {
    fn from(bands: Vec<f32>) -> Self {
        Self { bands }
    }
}

/// Samples an attached signal into a loudness value and a banded spectrum.
///
/// With no source attached (or nothing to read yet) every sample is silence.
pub struct SpectrumAnalyzer {
    num_bands: usize,
    magnitudes: MagnitudeAnalyzer,
    source: Option<Box<dyn SignalSource>>,
    window: Vec<f32>,
    bins: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(config: &VisualizerConfig) -> Self {
        let magnitudes =
            MagnitudeAnalyzer::new(config.fft_size, config.min_decibels, config.max_decibels);
        Self {
            num_bands: config.band_count(),
            window: vec![0.0; magnitudes.fft_size()],
            bins: Vec::with_capacity(magnitudes.bin_count()),
            magnitudes,
            source: None,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Attach a signal source. Returns `false` when a source with the same key
    /// is already attached, in which case nothing changes.
    pub fn attach(&mut self, source: Box<dyn SignalSource>) -> bool {
        if let Some(current) = &self.source {
            if current.key() == source.key() {
                debug!("Source {} already attached", source.key());
                return false;
            }
        }

        info!(
            "Attached audio source {} ({} Hz, {} bins -> {} bands)",
            source.key(),
            source.sample_rate(),
            self.magnitudes.bin_count(),
            self.num_bands
        );
        self.source = Some(source);
        true
    }

    pub fn detach(&mut self) -> Option<Box<dyn SignalSource>> {
        self.source.take()
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// Sample the signal at the playhead.
    pub fn sample(&mut self, playhead_seconds: f64) -> (f32, SpectrumFrame) {
        let Some(source) = self.source.as_mut() else {
            return (0.0, SpectrumFrame::zeros(self.num_bands));
        };

        if !source.read_window(playhead_seconds, &mut self.window) {
            return (0.0, SpectrumFrame::zeros(self.num_bands));
        }

        self.magnitudes.analyze(&self.window, &mut self.bins);
        (loudness(&self.bins), bin_bands(&self.bins, self.num_bands))
    }
}

/// Mean of all normalized bin magnitudes.
pub fn loudness(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().sum::<f32>() / bins.len() as f32
}

/// Average contiguous groups of bins into `num_bands` bands.
///
/// Groups are `bins.len() / num_bands` wide with the last group taking the
/// remainder. When there are fewer bins than bands each band reads one bin
/// and the bands past the end stay silent.
pub fn bin_bands(bins: &[f32], num_bands: usize) -> SpectrumFrame {
    let num_bands = num_bands.max(1);
    let total = bins.len();
    if total == 0 {
        return SpectrumFrame::zeros(num_bands);
    }

    let width = (total / num_bands).max(1);
    let bands = (0..num_bands)
        .map(|band| {
            let start = band * width;
            let end = if band == num_bands - 1 {
                total
            } else {
                ((band + 1) * width).min(total)
            };
            average_range(bins, start, end)
        })
        .collect();

    SpectrumFrame { bands }
}

fn average_range(data: &[f32], start: usize, end: usize) -> f32 {
    if start >= end || start >= data.len() {
        return 0.0;
    }

    let end = end.min(data.len());
    let sum: f32 = data[start..end].iter().sum();
    sum / (end - start) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::BufferSource;

    fn small_config(num_bands: usize) -> VisualizerConfig {
        VisualizerConfig {
            num_bands,
            fft_size: 256,
            ..Default::default()
        }
    }

    #[test]
    fn test_unattached_is_silent() {
        let mut analyzer = SpectrumAnalyzer::new(&small_config(8));
        let (level, frame) = analyzer.sample(1.0);
        assert_eq!(level, 0.0);
        assert_eq!(frame, SpectrumFrame::zeros(8));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut analyzer = SpectrumAnalyzer::new(&small_config(8));
        assert!(analyzer.attach(Box::new(BufferSource::new("song.wav", vec![0.1; 512], 8000.0))));
        assert!(!analyzer.attach(Box::new(BufferSource::new("song.wav", vec![0.1; 512], 8000.0))));
        assert!(analyzer.is_attached());
        assert!(analyzer.attach(Box::new(BufferSource::new("other.wav", vec![0.1; 512], 8000.0))));
    }

    #[test]
    fn test_empty_source_is_silent() {
        let mut analyzer = SpectrumAnalyzer::new(&small_config(4));
        analyzer.attach(Box::new(BufferSource::new("empty", Vec::new(), 8000.0)));
        let (level, frame) = analyzer.sample(0.5);
        assert_eq!(level, 0.0);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_signal_produces_energy() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 8000.0).sin())
            .collect();
        let mut analyzer = SpectrumAnalyzer::new(&small_config(8));
        analyzer.attach(Box::new(BufferSource::new("tone", samples, 8000.0)));
        let (level, frame) = analyzer.sample(0.25);
        assert!(level > 0.0 && level <= 1.0);
        assert_eq!(frame.len(), 8);
        // 440 Hz sits in the lowest eighth of a 4 kHz range
        assert!(frame.energy(0) > frame.energy(7));
    }

    #[test]
    fn test_binning_last_band_takes_remainder() {
        let bins = [1.0, 1.0, 0.0, 0.0, 0.5, 0.5, 0.5];
        let frame = bin_bands(&bins, 3);
        assert_eq!(frame.bands, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_binning_more_bands_than_bins() {
        let frame = bin_bands(&[0.2, 0.4], 4);
        assert_eq!(frame.bands, vec![0.2, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn test_binning_guards() {
        assert_eq!(bin_bands(&[], 5), SpectrumFrame::zeros(5));
        assert_eq!(bin_bands(&[0.3, 0.5], 0).bands, vec![0.4]);
        assert_eq!(loudness(&[]), 0.0);
        assert_eq!(loudness(&[0.25, 0.75]), 0.5);
    }
}
