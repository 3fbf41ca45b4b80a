pub mod compositor;
pub mod pulse;

pub use compositor::{composite, label_opacity, orbit_position, Composite, CompositorInput, ObjectVisual};
pub use pulse::{PulseDisplay, PulseEngine};
