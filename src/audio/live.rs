use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use crossbeam_channel::Receiver;
use log::{info, warn};
use std::collections::VecDeque;

use super::SignalSource;

/// Most recent mono samples from an interleaved capture stream.
struct SampleRing {
    samples: VecDeque<f32>,
    capacity: usize,
    channels: usize,
}

impl SampleRing {
    fn new(capacity: usize, channels: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            channels: channels.max(1),
        }
    }

    /// Mix each interleaved frame down to one sample and drop the oldest
    /// samples past capacity. A trailing partial frame is ignored.
    fn push_interleaved(&mut self, data: &[f32]) {
        let channels = self.channels;
        self.samples.extend(
            data.chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
        let excess = self.samples.len().saturating_sub(self.capacity);
        self.samples.drain(..excess);
    }

    /// Right-align the newest samples in `out`, zero-filling the front.
    fn copy_latest(&self, out: &mut [f32]) -> bool {
        if self.samples.is_empty() {
            return false;
        }
        let available = self.samples.len().min(out.len());
        let (silence, tail) = out.split_at_mut(out.len() - available);
        silence.fill(0.0);
        for (slot, &sample) in tail.iter_mut().zip(self.samples.range(self.samples.len() - available..)) {
            *slot = sample;
        }
        true
    }
}

/// Microphone / line-in capture from the default input device.
///
/// The cpal callback only forwards raw interleaved buffers over a channel;
/// `read_window` drains whatever has arrived without waiting.
pub struct LiveSource {
    _stream: Stream,
    key: String,
    receiver: Receiver<Vec<f32>>,
    ring: SampleRing,
    sample_rate: f32,
}

impl LiveSource {
    pub fn new(window_size: usize) -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;
        let supported = device
            .default_input_config()
            .map_err(|e| anyhow!("Failed to get default input config: {}", e))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let sample_rate = supported.sample_rate().0 as f32;
        let channels = supported.channels() as usize;
        info!("Capturing from {} ({} channels at {} Hz)", name, channels, sample_rate);

        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<f32>>();
        let stream = device.build_input_stream(
            &supported.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // receiver gone means the source was dropped
                let _ = sender.send(data.to_vec());
            },
            |err| warn!("Capture stream error: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            key: format!("live:{}", name),
            receiver,
            ring: SampleRing::new(window_size.max(1) * 4, channels),
            sample_rate,
        })
    }
}

impl SignalSource for LiveSource {
    fn key(&self) -> &str {
        &self.key
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn read_window(&mut self, _playhead_seconds: f64, out: &mut [f32]) -> bool {
        for chunk in self.receiver.try_iter() {
            self.ring.push_interleaved(&chunk);
        }
        self.ring.copy_latest(out)
    }
}
