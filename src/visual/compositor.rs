use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use crate::neo::BandSlot;

pub const HAZARD_COLOR: Vec3 = Vec3::new(1.0, 0.35, 0.25);
pub const SAFE_COLOR: Vec3 = Vec3::new(0.45, 0.75, 1.0);
pub const HOT_COLOR: Vec3 = Vec3::new(1.0, 0.95, 0.8);

const RADIUS_ENERGY_GAIN: f32 = 0.6;
const RADIUS_PULSE_GAIN: f32 = 0.15;
const MISS_DISTANCE_SCALE: f64 = 1.0e6;
const MISS_DISTANCE_GAIN: f32 = 0.4;
const MAX_INCLINATION: f32 = 0.6;
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Everything the compositor looks at for one object in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorInput {
    pub band_energy: f32,
    pub loudness: f32,
    pub pulse: f32,
    pub hazardous: bool,
    pub base_radius: f32,
    pub miss_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composite {
    /// Extra orbital radius, increasing with band energy.
    pub radius_offset: f32,
    pub orbit_radius: f32,
    pub scale: f32,
    /// 0 = hazard/safe base color, 1 = hot highlight.
    pub color_mix: f32,
    pub color: Vec3,
}

/// Visual parameters for one object. Pure: same input, same output.
pub fn composite(input: &CompositorInput) -> Composite {
    let energy = input.band_energy;
    let loudness = input.loudness;

    let radius_offset = energy * RADIUS_ENERGY_GAIN + input.pulse * RADIUS_PULSE_GAIN;
    let distance_term = ((1.0 + input.miss_distance.max(0.0) / MISS_DISTANCE_SCALE).ln()) as f32;
    let orbit_radius = input.base_radius + distance_term * MISS_DISTANCE_GAIN + radius_offset;

    let scale = 1.0 + (energy * 0.8).max(loudness * 0.4);
    let color_mix = (energy * 1.8).max(loudness * 0.9).clamp(0.0, 1.0);
    let base = if input.hazardous { HAZARD_COLOR } else { SAFE_COLOR };

    Composite {
        radius_offset,
        orbit_radius,
        scale,
        color_mix,
        color: base.lerp(HOT_COLOR, color_mix),
    }
}

pub fn label_opacity(display_pulse: f32) -> f32 {
    0.35 + 0.65 * display_pulse.clamp(0.0, 1.0)
}

/// Place an object on its band's ring.
///
/// Objects in a band are spaced evenly around the ring; each band's ring is
/// rotated by the golden angle and tilted by its position in the spectrum.
pub fn orbit_position(slot: BandSlot, band_size: usize, num_bands: usize, radius: f32) -> Vec3 {
    let band_size = band_size.max(1) as f32;
    let num_bands = num_bands.max(1) as f32;
    let band = slot.band as f32;

    let angle = std::f32::consts::TAU * (slot.slot as f32 + 0.5) / band_size + band * GOLDEN_ANGLE;
    let inclination = ((band + 0.5) / num_bands - 0.5) * 2.0 * MAX_INCLINATION;

    let flat = Vec3::new(angle.cos(), 0.0, angle.sin()) * radius;
    Quat::from_rotation_x(inclination) * flat
}

/// Per-object frame output, laid out for direct upload to a GPU buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectVisual {
    pub position: [f32; 3],
    pub scale: f32,
    pub color: [f32; 3],
    pub color_mix: f32,
    pub radius_offset: f32,
    pub label_opacity: f32,
    pub pulse: f32,
    pub band: u32,
}

impl ObjectVisual {
    pub fn new(composite: &Composite, position: Vec3, display_pulse: f32, band: usize) -> Self {
        Self {
            position: position.to_array(),
            scale: composite.scale,
            color: composite.color.to_array(),
            color_mix: composite.color_mix,
            radius_offset: composite.radius_offset,
            label_opacity: label_opacity(display_pulse),
            pulse: display_pulse,
            band: band as u32,
        }
    }
}
