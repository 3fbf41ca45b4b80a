//! Audio- and MIDI-reactive visual state for near-Earth objects.
//!
//! Every frame a [`VisualizerSession`] samples the attached signal, smooths
//! the banded spectrum, fires due MIDI notes into per-object pulses and
//! composites one [`ObjectVisual`] per object for an external renderer.

pub mod audio;
pub mod config;
pub mod midi;
pub mod neo;
pub mod session;
pub mod visual;

pub use config::VisualizerConfig;
pub use session::{FrameOutput, TickInput, VisualizerSession};
pub use visual::ObjectVisual;
