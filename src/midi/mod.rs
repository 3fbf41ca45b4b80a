pub mod compose;
pub mod event;
pub mod scheduler;

pub use compose::{compose, CompositionSettings};
pub use event::{decode_events, load_events, save_events, MidiEvent};
pub use scheduler::{FiredEvent, MidiEventScheduler, Playhead};
