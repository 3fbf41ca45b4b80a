use anyhow::{bail, Context, Result};
use log::info;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::path::Path;
use std::sync::Arc;

/// Anything that can hand the analyzer a window of recent mono samples.
///
/// Implementations must never block: if nothing is available yet they return
/// `false` and the analyzer reports silence.
pub trait SignalSource {
    /// Identity of the underlying signal. Attaching a source whose key matches
    /// the one already attached is a no-op.
    fn key(&self) -> &str;

    fn sample_rate(&self) -> f32;

    /// Fill `out` with the window of samples ending at `playhead_seconds`.
    ///
    /// Live sources ignore the playhead and return their most recent samples.
    fn read_window(&mut self, playhead_seconds: f64, out: &mut [f32]) -> bool;
}

/// Windowed FFT producing byte-frequency-data style magnitudes in [0, 1].
///
/// Each bin is `|X| / N` converted to decibels and mapped linearly from
/// `[min_decibels, max_decibels]` onto `[0, 1]`.
pub struct MagnitudeAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    min_decibels: f32,
    max_decibels: f32,
}

impl MagnitudeAnalyzer {
    pub fn new(fft_size: usize, min_decibels: f32, max_decibels: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: Self::hann_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            min_decibels,
            max_decibels,
        }
    }

    fn hann_window(size: usize) -> Vec<f32> {
        if size < 2 {
            return vec![1.0; size];
        }
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced per analysis.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyze one time-domain window into `out` (resized to `bin_count`).
    /// Short windows are zero-padded.
    pub fn analyze(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let range = self.max_decibels - self.min_decibels;
        let scale = 1.0 / self.fft_size as f32;
        out.clear();
        out.extend(self.buffer[..self.bin_count()].iter().map(|c| {
            let magnitude = c.norm() * scale;
            let decibels = 20.0 * magnitude.max(1e-12).log10();
            ((decibels - self.min_decibels) / range).clamp(0.0, 1.0)
        }));
    }
}

/// In-memory mono signal addressed by playhead time.
///
/// Backs both file playback (via [`BufferSource::from_wav`]) and tests.
pub struct BufferSource {
    key: String,
    samples: Vec<f32>,
    sample_rate: f32,
}

impl BufferSource {
    pub fn new(key: impl Into<String>, samples: Vec<f32>, sample_rate: f32) -> Self {
        Self {
            key: key.into(),
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file and mix it down to mono.
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            bail!("WAV file {} has no channels", path.display());
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()?
            }
        };

        let samples: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        info!(
            "Loaded audio file: {} ({}Hz, {} channels, {} samples)",
            path.display(),
            spec.sample_rate,
            channels,
            samples.len()
        );

        Ok(Self::new(
            path.display().to_string(),
            samples,
            spec.sample_rate as f32,
        ))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.samples.len() as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }
}

impl SignalSource for BufferSource {
    fn key(&self) -> &str {
        &self.key
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn read_window(&mut self, playhead_seconds: f64, out: &mut [f32]) -> bool {
        if self.samples.is_empty() || !playhead_seconds.is_finite() {
            return false;
        }

        let end = (playhead_seconds.max(0.0) * self.sample_rate as f64) as i64;
        let start = end - out.len() as i64;
        for (i, slot) in out.iter_mut().enumerate() {
            let index = start + i as i64;
            *slot = if index >= 0 {
                self.samples.get(index as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut analyzer = MagnitudeAnalyzer::new(256, -100.0, -30.0);
        let mut bins = Vec::new();
        analyzer.analyze(&[0.0; 256], &mut bins);
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 8000.0;
        let mut analyzer = MagnitudeAnalyzer::new(256, -100.0, -30.0);
        // 1000 Hz lands exactly on bin 32 at 8 kHz / 256
        let signal = sine(1000.0, sample_rate, 256, 0.001);
        let mut bins = Vec::new();
        analyzer.analyze(&signal, &mut bins);

        let peak = bins
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, 32);
        assert!(bins[32] > bins[31] && bins[32] > bins[33]);
        assert!(bins.iter().all(|&b| (0.0..=1.0).contains(&b)));
    }

    #[test]
    fn test_buffer_window_follows_playhead() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let mut source = BufferSource::new("ramp", samples, 10.0);
        let mut window = [0.0; 4];

        // 5 s at 10 Hz ends at sample 50
        assert!(source.read_window(5.0, &mut window));
        assert_eq!(window, [46.0, 47.0, 48.0, 49.0]);

        // before the start pads with zeros
        assert!(source.read_window(0.2, &mut window));
        assert_eq!(window, [0.0, 0.0, 0.0, 1.0]);

        // past the end pads with zeros
        assert!(source.read_window(20.0, &mut window));
        assert_eq!(window, [0.0; 4]);
    }

    #[test]
    fn test_empty_buffer_reports_nothing() {
        let mut source = BufferSource::new("empty", Vec::new(), 44100.0);
        let mut window = [1.0; 8];
        assert!(!source.read_window(1.0, &mut window));
    }

    #[test]
    fn test_wav_mixdown() {
        let path = std::env::temp_dir().join("neo_pulse_mixdown_test.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let source = BufferSource::from_wav(&path).unwrap();
        assert_eq!(source.sample_rate(), 8000.0);
        assert_eq!(source.samples.len(), 10);
        assert!((source.samples[0] - 0.25).abs() < 1e-4);
        let _ = std::fs::remove_file(&path);
    }
}
