use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A timed note, decoded once and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Seconds from the start of the timeline.
    pub time: f64,
    pub duration: f64,
    pub pitch: u8,
    /// Note-on strength in [0, 1].
    pub velocity: f32,
}

impl MidiEvent {
    pub fn new(time: f64, duration: f64, pitch: u8, velocity: f32) -> Self {
        Self {
            time,
            duration,
            pitch,
            velocity,
        }
    }

    /// Drop events with unusable timing and clamp the rest into range.
    pub(crate) fn sanitized(self) -> Option<Self> {
        if !self.time.is_finite() {
            return None;
        }
        let velocity = if self.velocity.is_finite() {
            self.velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let duration = if self.duration.is_finite() {
            self.duration.max(0.0)
        } else {
            0.0
        };
        Some(Self {
            velocity,
            duration,
            ..self
        })
    }
}

/// Decode a JSON event list. Anything undecodable yields no events, which
/// leaves pulses driven by loudness alone.
pub fn decode_events(bytes: &[u8]) -> Vec<MidiEvent> {
    match serde_json::from_slice::<Vec<MidiEvent>>(bytes) {
        Ok(events) => {
            let total = events.len();
            let events: Vec<MidiEvent> = events.into_iter().filter_map(MidiEvent::sanitized).collect();
            if events.len() < total {
                warn!("Dropped {} MIDI events with invalid timing", total - events.len());
            }
            events
        }
        Err(e) => {
            warn!("Failed to decode MIDI events: {}", e);
            Vec::new()
        }
    }
}

/// Read and decode an event file. Only a failure to read the file is an error.
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<MidiEvent>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read MIDI events {}", path.display()))?;
    let events = decode_events(&bytes);
    info!("Loaded {} MIDI events from {}", events.len(), path.display());
    Ok(events)
}

pub fn save_events<P: AsRef<Path>>(events: &[MidiEvent], path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(events)?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write MIDI events {}", path.as_ref().display()))?;
    Ok(())
}
