use anyhow::Result;
use log::{debug, info};

use crate::audio::{SignalSource, SmoothedSpectrum, SpectrumAnalyzer, SpectrumFrame};
use crate::config::{clamp_offset, VisualizerConfig};
use crate::midi::{FiredEvent, MidiEvent, MidiEventScheduler};
use crate::neo::{assign, BandAssignment, NeoRecord};
use crate::visual::{composite, orbit_position, CompositorInput, ObjectVisual, PulseDisplay, PulseEngine};

/// Log frame diagnostics this often (~2 seconds at 60fps).
const DEBUG_EVERY_FRAMES: u64 = 120;

/// Everything a tick depends on that comes from outside the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    /// Current audio (or MIDI-only) timeline position in seconds.
    pub playhead_seconds: f64,
    /// Live MIDI sync correction, clamped to the supported range.
    pub offset_seconds: f64,
    /// Seconds since the previous tick.
    pub dt: f32,
}

/// What the renderer gets each frame.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub loudness: f32,
    pub spectrum: SpectrumFrame,
    /// One entry per object, in source order.
    pub visuals: Vec<ObjectVisual>,
    pub fired: Vec<FiredEvent>,
    pub surged: bool,
}

/// Records plus all per-object state derived from them. Replaced as a whole
/// so pulses and band assignments always have the same length.
struct ObjectSet {
    records: Vec<NeoRecord>,
    assignment: BandAssignment,
    pulses: PulseEngine,
    display: PulseDisplay,
}

impl ObjectSet {
    fn new(records: Vec<NeoRecord>, config: &VisualizerConfig) -> Self {
        let count = records.len();
        Self {
            assignment: assign(&records, config.band_count()),
            pulses: PulseEngine::new(count, config.decay_rate, config.loudness_threshold),
            display: PulseDisplay::new(count, config.pulse_approach_rate),
            records,
        }
    }
}

/// Drives the whole audio-to-visual pipeline one frame at a time.
///
/// Each tick: sample the signal, smooth the spectrum, drain due MIDI events
/// into pulses, apply the loudness flash, decay, then composite every object.
pub struct VisualizerSession {
    config: VisualizerConfig,
    analyzer: SpectrumAnalyzer,
    smoothed: SmoothedSpectrum,
    scheduler: MidiEventScheduler,
    objects: ObjectSet,
    frame_count: u64,
}

impl VisualizerSession {
    pub fn new(config: VisualizerConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Creating session: {} bands, threshold {:.2}, decay {:.3}/tick",
            config.band_count(),
            config.loudness_threshold,
            config.decay_rate
        );

        Ok(Self {
            analyzer: SpectrumAnalyzer::new(&config),
            smoothed: SmoothedSpectrum::with_retain(config.band_count(), config.smoothing),
            scheduler: MidiEventScheduler::new(),
            objects: ObjectSet::new(Vec::new(), &config),
            frame_count: 0,
            config,
        })
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// Attach an audio source; attaching the same source again does nothing.
    pub fn attach_source(&mut self, source: Box<dyn SignalSource>) -> bool {
        self.analyzer.attach(source)
    }

    pub fn detach_source(&mut self) -> Option<Box<dyn SignalSource>> {
        self.analyzer.detach()
    }

    /// Swap in a new object set. Pulses restart from zero.
    pub fn set_objects(&mut self, records: Vec<NeoRecord>) {
        info!("Loading {} objects into {} bands", records.len(), self.config.band_count());
        self.objects = ObjectSet::new(records, &self.config);
    }

    /// Replace the MIDI queue. Already-fired events from a previous queue are
    /// not replayed unless they are part of `events`.
    pub fn load_midi(&mut self, events: Vec<MidiEvent>) {
        self.scheduler.load(events);
    }

    pub fn records(&self) -> &[NeoRecord] {
        &self.objects.records
    }

    pub fn assignment(&self) -> &BandAssignment {
        &self.objects.assignment
    }

    pub fn pulses(&self) -> &[f32] {
        self.objects.pulses.values()
    }

    pub fn displayed_pulses(&self) -> &[f32] {
        self.objects.display.values()
    }

    pub fn scheduler(&self) -> &MidiEventScheduler {
        &self.scheduler
    }

    pub fn smoothed_spectrum(&self) -> &[f32] {
        self.smoothed.state()
    }

    pub fn tick(&mut self, input: TickInput) -> FrameOutput {
        self.frame_count += 1;

        let (loudness, raw) = self.analyzer.sample(input.playhead_seconds);
        let spectrum = self.smoothed.update(&raw);

        let objects = &mut self.objects;
        let count = objects.records.len();
        let fired = self
            .scheduler
            .drain(input.playhead_seconds, clamp_offset(input.offset_seconds), count);
        let hits: Vec<(usize, f32)> = fired
            .iter()
            .filter_map(|f| f.target.map(|target| (target, f.event.velocity)))
            .collect();

        let surged = objects.pulses.tick(loudness, &hits);
        objects.display.update(objects.pulses.values(), input.dt);

        let num_bands = objects.assignment.num_bands();
        let visuals = objects
            .records
            .iter()
            .zip(objects.assignment.slots())
            .enumerate()
            .map(|(index, (record, &slot))| {
                let display_pulse = objects.display.get(index);
                let parts = composite(&CompositorInput {
                    band_energy: spectrum.energy(slot.band),
                    loudness,
                    pulse: display_pulse,
                    hazardous: record.hazardous,
                    base_radius: self.config.base_radius,
                    miss_distance: record.miss_distance,
                });
                let position = orbit_position(
                    slot,
                    objects.assignment.band_size(slot.band),
                    num_bands,
                    parts.orbit_radius,
                );
                ObjectVisual::new(&parts, position, display_pulse, slot.band)
            })
            .collect();

        if self.frame_count % DEBUG_EVERY_FRAMES == 0 {
            debug!(
                "Frame {}: loudness={:.3}, peak band={:.3}, fired={}, pending={}",
                self.frame_count,
                loudness,
                spectrum.bands.iter().fold(0.0f32, |a, &b| a.max(b)),
                fired.len(),
                self.scheduler.pending()
            );
        }

        FrameOutput {
            loudness,
            spectrum,
            visuals,
            fired,
            surged,
        }
    }
}
