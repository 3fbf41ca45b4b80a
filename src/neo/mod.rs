pub mod bands;
pub mod record;

pub use bands::{assign, band_for, fnv1a_hash, BandAssignment, BandSlot};
pub use record::{load_records, parse_feed, NeoRecord};
