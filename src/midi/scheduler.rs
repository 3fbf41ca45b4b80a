use log::{debug, info};
use std::collections::VecDeque;

use super::MidiEvent;
use crate::config::clamp_offset;

/// A fired event and the object it was routed to, if any objects exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredEvent {
    pub event: MidiEvent,
    pub target: Option<usize>,
}

/// Time-ordered queue of pending notes, drained against a moving playhead.
///
/// Events are sorted once on load and only ever removed from the front, so a
/// fired event is gone for good. Replaying means loading a fresh queue.
#[derive(Debug, Default)]
pub struct MidiEventScheduler {
    queue: VecDeque<MidiEvent>,
    cursor: usize,
    fired_total: usize,
}

impl MidiEventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue with `events`, sorted ascending by time (ties keep
    /// their source order), and restart round-robin routing.
    pub fn load(&mut self, events: Vec<MidiEvent>) {
        let mut events: Vec<MidiEvent> = events.into_iter().filter_map(MidiEvent::sanitized).collect();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        info!("Scheduled {} MIDI events", events.len());
        self.queue = events.into();
        self.cursor = 0;
        self.fired_total = 0;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn next_event(&self) -> Option<&MidiEvent> {
        self.queue.front()
    }

    pub fn fired_total(&self) -> usize {
        self.fired_total
    }

    /// Remove every event due at `playhead_seconds + offset_seconds` and route
    /// each to the next object in round-robin order.
    ///
    /// The offset is only applied here, so changing it between calls can fire
    /// a burst of events or hold them back, but never refires removed ones.
    /// With no objects the events are still drained, just not routed.
    pub fn drain(
        &mut self,
        playhead_seconds: f64,
        offset_seconds: f64,
        object_count: usize,
    ) -> Vec<FiredEvent> {
        let due = playhead_seconds + offset_seconds;
        let mut fired = Vec::new();
        if !due.is_finite() {
            return fired;
        }

        while self.queue.front().is_some_and(|event| event.time <= due) {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            fired.push(FiredEvent {
                event,
                target: self.route(object_count),
            });
        }

        if !fired.is_empty() {
            self.fired_total += fired.len();
            debug!(
                "Fired {} MIDI events at {:.3}s, {} pending",
                fired.len(),
                due,
                self.queue.len()
            );
        }
        fired
    }

    fn route(&mut self, object_count: usize) -> Option<usize> {
        if object_count == 0 {
            return None;
        }
        let target = self.cursor % object_count;
        self.cursor = (target + 1) % object_count;
        Some(target)
    }
}

/// Current position on the audio/MIDI timeline plus the live sync offset.
///
/// Audio playback sets the position from its clock; the MIDI-only path
/// advances it by frame time instead.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Playhead {
    position: f64,
    offset: f64,
}

impl Playhead {
    pub fn new(offset: f64) -> Self {
        Self {
            position: 0.0,
            offset: clamp_offset(offset),
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn seek(&mut self, position: f64) {
        if position.is_finite() {
            self.position = position.max(0.0);
        }
    }

    pub fn advance(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.position += dt;
        }
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = clamp_offset(offset);
    }
}
