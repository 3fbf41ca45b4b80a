//! Turns a set of close approaches into a note stream, so the visualizer can
//! pulse without any audio or MIDI input of its own.
//!
//! Approach times are compressed onto a fixed piece length. Close approaches
//! play louder and higher, fast objects play shorter notes, and hazardous
//! objects add a drum hit. The key and mode step forward at a fixed interval.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::MidiEvent;
use crate::neo::NeoRecord;

/// Scale intervals in semitones, in modulation order.
const SCALES: [(&str, &[u8]); 7] = [
    ("minor_pentatonic", &[0, 3, 5, 7, 10]),
    ("major_pentatonic", &[0, 2, 4, 7, 9]),
    ("natural_minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("major", &[0, 2, 4, 5, 7, 9, 11]),
    ("dorian", &[0, 2, 3, 5, 7, 9, 10]),
    ("lydian", &[0, 2, 4, 6, 7, 9, 11]),
    ("phrygian", &[0, 1, 3, 5, 7, 8, 10]),
];

/// Key names and their MIDI note in octave 4, in modulation order.
const KEYS: [(&str, u8); 17] = [
    ("C", 60),
    ("C#", 61),
    ("Db", 61),
    ("D", 62),
    ("D#", 63),
    ("Eb", 63),
    ("E", 64),
    ("F", 65),
    ("F#", 66),
    ("Gb", 66),
    ("G", 67),
    ("G#", 68),
    ("Ab", 68),
    ("A", 69),
    ("A#", 70),
    ("Bb", 70),
    ("B", 71),
];

const RANGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSettings {
    pub minutes: f64,
    pub key: String,
    pub mode: String,
    /// Seconds between key/mode changes.
    pub modulation_every: f64,
    pub base_octave: u8,
    pub octaves_spread: u8,
    /// MIDI velocity range (0-127) for the quietest and loudest notes.
    pub min_velocity: u8,
    pub max_velocity: u8,
    pub min_duration: f64,
    pub max_duration: f64,
    pub hazard_drum_note: u8,
    pub hazard_velocity: u8,
    pub hazard_duration: f64,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            minutes: 3.0,
            key: "A".to_string(),
            mode: "minor_pentatonic".to_string(),
            modulation_every: 60.0,
            base_octave: 3,
            octaves_spread: 3,
            min_velocity: 28,
            max_velocity: 112,
            min_duration: 0.15,
            max_duration: 1.8,
            hazard_drum_note: 39,
            hazard_velocity: 96,
            hazard_duration: 0.1,
        }
    }
}

impl CompositionSettings {
    fn key_index(&self) -> usize {
        KEYS.iter().position(|(name, _)| *name == self.key).unwrap_or(13)
    }

    fn mode_index(&self) -> usize {
        SCALES.iter().position(|(name, _)| *name == self.mode).unwrap_or(0)
    }

    /// Tonic note and scale in effect at `time` seconds into the piece.
    fn key_and_scale(&self, time: f64) -> (u8, &'static [u8]) {
        let step = if self.modulation_every > 0.0 {
            (time / self.modulation_every).floor().max(0.0) as usize
        } else {
            0
        };
        let (_, tonic) = KEYS[(self.key_index() + step) % KEYS.len()];
        let (_, scale) = SCALES[(self.mode_index() + step) % SCALES.len()];
        (tonic, scale)
    }
}

fn normalized(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min + RANGE_EPSILON)
}

fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Piece time for each record: timed records spread over the piece by their
/// real approach time, untimed ones by their position in the list.
fn piece_times(records: &[NeoRecord], span_seconds: f64) -> Vec<f64> {
    let bounds = records
        .iter()
        .filter_map(|r| r.approach_time)
        .fold(None, |bounds: Option<(NaiveDateTime, NaiveDateTime)>, t| match bounds {
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            None => Some((t, t)),
        });
    let real_span = bounds.map_or(0.0, |(lo, hi)| seconds_between(lo, hi));
    let count = records.len().max(1) as f64;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| match (record.approach_time, bounds) {
            (Some(time), Some((first, _))) if real_span > 0.0 => {
                seconds_between(first, time) / real_span * span_seconds
            }
            (Some(_), _) => 0.0,
            (None, _) => index as f64 / count * span_seconds,
        })
        .collect()
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Compose a note stream for `records`, sorted by time.
pub fn compose(records: &[NeoRecord], settings: &CompositionSettings) -> Vec<MidiEvent> {
    if records.is_empty() {
        return Vec::new();
    }

    let times = piece_times(records, settings.minutes * 60.0);
    let (miss_min, miss_max) = value_range(records.iter().map(|r| r.miss_distance));
    let (vel_min, vel_max) = value_range(records.iter().map(|r| r.velocity));

    let velocity_span = settings.max_velocity as f64 - settings.min_velocity as f64;
    let duration_span = settings.max_duration - settings.min_duration;

    let mut events = Vec::with_capacity(records.len());
    for (record, &time) in records.iter().zip(times.iter()) {
        let near = (1.0 - normalized(record.miss_distance, miss_min, miss_max)).clamp(0.0, 1.0);
        let speed = normalized(record.velocity, vel_min, vel_max).clamp(0.0, 1.0);

        let midi_velocity = settings.min_velocity as f64 + near * velocity_span;
        let duration = settings.max_duration - speed * duration_span;

        let (tonic, scale) = settings.key_and_scale(time);
        let root = tonic as i32 - 12 + settings.base_octave as i32 * 12;
        let degrees = (scale.len() * settings.octaves_spread.max(1) as usize) as f64;
        let degree = (near * (degrees - 1.0)).round() as usize;
        let pitch = root + scale[degree % scale.len()] as i32 + 12 * (degree / scale.len()) as i32;

        events.push(MidiEvent::new(
            time,
            duration,
            pitch.clamp(0, 127) as u8,
            (midi_velocity / 127.0).clamp(0.0, 1.0) as f32,
        ));

        if record.hazardous {
            events.push(MidiEvent::new(
                time,
                settings.hazard_duration,
                settings.hazard_drum_note,
                settings.hazard_velocity as f32 / 127.0,
            ));
        }
    }

    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}
