pub mod smoothing;
pub mod source;
pub mod spectrum;

#[cfg(feature = "live-input")]
pub mod live;

pub use smoothing::{SmoothedSpectrum, DEFAULT_SMOOTHING};
pub use source::{BufferSource, MagnitudeAnalyzer, SignalSource};
pub use spectrum::{SpectrumAnalyzer, SpectrumFrame};

#[cfg(feature = "live-input")]
pub use live::LiveSource;
