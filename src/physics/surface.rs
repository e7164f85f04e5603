//! Water surface height field.
//!
//! The surface is a superposition of sinusoidal wave terms on top of a
//! constant depth:
//!
//! ```text
//! h(x, y, t) = A * sum_i w_i * sin(k_i * s_i(x, y) + 2*pi*f*t + c_i * FI) + DEPTH
//! ```
//!
//! Where:
//! - s_i = distance to the term's center (radial waves) or projection on the
//!   term's direction (planar waves)
//! - k_i = wavenumber factor * 2*pi / (wavelength * scale)
//! - w_i = relative weight, c_i = multiple of the global phase offset FI
//!
//! The temporal part `2*pi*f*t` is passed in precomputed as `phase` so a frame
//! evaluates it once instead of once per sample.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::WaveParameters;

/// Temporal phase `2 * PI * frequency * time` of one frame.
#[inline]
pub fn temporal_phase(frequency: f64, time: f64) -> f64 {
    std::f64::consts::TAU * frequency * time
}

/// Anything that can report the water height at a point and phase.
///
/// Implementations must be pure: the same inputs always give the same height.
pub trait HeightField: Send + Sync {
    /// Absolute water height at `(x, y)` for the temporal phase `phase`.
    fn height(&self, x: f64, y: f64, phase: f64) -> f64;
}

/// Spatial profile of a wave term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveShape {
    /// Circular wave spreading from `center`
    Radial { center: DVec2 },
    /// Plane wave; the phase grows along `direction` (not necessarily unit length)
    Planar { direction: DVec2 },
}

/// How a wave term changes over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveMotion {
    /// `sin(k*s + phase)`
    Travelling,
    /// `sin(k*s) * sin(phase)`
    Standing,
    /// `sin(k*s)`, frozen in time
    Static,
}

/// One sinusoidal component of a [`WaveSurface`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveTerm {
    pub shape: WaveShape,
    pub weight: f64,
    /// Multiple of the global phase offset FI added to this term
    pub phase_factor: f64,
    /// Multiple of the base wavenumber
    pub wavenumber_factor: f64,
    pub motion: WaveMotion,
}

impl WaveTerm {
    /// Travelling circular wave centered at `center`.
    pub fn radial(center: DVec2, weight: f64) -> Self {
        Self {
            shape: WaveShape::Radial { center },
            weight,
            phase_factor: 0.0,
            wavenumber_factor: 1.0,
            motion: WaveMotion::Travelling,
        }
    }

    /// Travelling plane wave advancing along `direction`.
    pub fn planar(direction: DVec2, weight: f64) -> Self {
        Self {
            shape: WaveShape::Planar { direction },
            weight,
            phase_factor: 0.0,
            wavenumber_factor: 1.0,
            motion: WaveMotion::Travelling,
        }
    }

    pub fn with_phase_factor(mut self, phase_factor: f64) -> Self {
        self.phase_factor = phase_factor;
        self
    }

    pub fn with_wavenumber_factor(mut self, wavenumber_factor: f64) -> Self {
        self.wavenumber_factor = wavenumber_factor;
        self
    }

    pub fn with_motion(mut self, motion: WaveMotion) -> Self {
        self.motion = motion;
        self
    }

    #[inline]
    fn spatial_coordinate(&self, point: DVec2) -> f64 {
        match self.shape {
            WaveShape::Radial { center } => point.distance(center),
            WaveShape::Planar { direction } => point.dot(direction),
        }
    }

    /// Weighted contribution of this term, before the global amplitude.
    #[inline]
    pub fn evaluate(&self, point: DVec2, wavenumber: f64, phase: f64, phase_offset: f64) -> f64 {
        let spatial = wavenumber * self.wavenumber_factor * self.spatial_coordinate(point);
        let temporal = phase + self.phase_factor * phase_offset;
        let value = match self.motion {
            WaveMotion::Travelling => (spatial + temporal).sin(),
            WaveMotion::Standing => spatial.sin() * temporal.sin(),
            WaveMotion::Static => (spatial + self.phase_factor * phase_offset).sin(),
        };
        self.weight * value
    }
}

/// Superposition of wave terms over a constant depth.
#[derive(Debug, Clone)]
pub struct WaveSurface {
    terms: Vec<WaveTerm>,
    amplitude: f64,
    depth: f64,
    wavenumber: f64,
    phase_offset: f64,
}

impl WaveSurface {
    /// Build a surface from an explicit term list and the wave parameters.
    pub fn new(terms: Vec<WaveTerm>, waves: &WaveParameters) -> Self {
        Self {
            terms,
            amplitude: waves.amplitude,
            depth: waves.depth,
            wavenumber: waves.wavenumber(),
            phase_offset: waves.phase_offset,
        }
    }

    pub fn terms(&self) -> &[WaveTerm] {
        &self.terms
    }
}

impl HeightField for WaveSurface {
    #[inline]
    fn height(&self, x: f64, y: f64, phase: f64) -> f64 {
        let point = DVec2::new(x, y);
        let sum: f64 = self
            .terms
            .iter()
            .map(|term| term.evaluate(point, self.wavenumber, phase, self.phase_offset))
            .sum();
        self.amplitude * sum + self.depth
    }
}

/// Perfectly still water at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct FlatSurface {
    pub level: f64,
}

impl HeightField for FlatSurface {
    #[inline]
    fn height(&self, _x: f64, _y: f64, _phase: f64) -> f64 {
        self.level
    }
}

/// Named surface shapes selectable from configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SurfacePreset {
    /// Two circular waves and one plane wave, all travelling
    #[default]
    Picasso,
    /// Two static circular sources interfering
    Interference,
    /// Static circular wave crossed by a static plane wave
    Wow,
    /// Two travelling plane waves crossing at 60 degrees
    Transverse,
    /// Two standing plane waves crossing at 60 degrees
    Standing,
    /// Still water
    Flat,
}

impl SurfacePreset {
    pub fn name(&self) -> &'static str {
        match self {
            SurfacePreset::Picasso => "picasso",
            SurfacePreset::Interference => "interference",
            SurfacePreset::Wow => "wow",
            SurfacePreset::Transverse => "transverse",
            SurfacePreset::Standing => "standing",
            SurfacePreset::Flat => "flat",
        }
    }

    /// Term list of this preset; empty for [`SurfacePreset::Flat`].
    pub fn terms(&self) -> Vec<WaveTerm> {
        let origin = DVec2::ZERO;
        let second_source = DVec2::new(200.0, 200.0);
        let along_y = DVec2::Y;
        // (y - x * sqrt(3)) / sqrt(2)
        let oblique = DVec2::new(-3f64.sqrt(), 1.0) / 2f64.sqrt();

        match self {
            SurfacePreset::Picasso => vec![
                WaveTerm::radial(origin, 1.0),
                WaveTerm::radial(second_source, 0.5).with_phase_factor(1.0),
                WaveTerm::planar(DVec2::X, 0.5).with_phase_factor(2.0),
            ],
            SurfacePreset::Interference => vec![
                WaveTerm::radial(origin, 1.0).with_motion(WaveMotion::Static),
                WaveTerm::radial(second_source, 1.0).with_motion(WaveMotion::Static),
            ],
            SurfacePreset::Wow => vec![
                WaveTerm::radial(origin, 1.0).with_motion(WaveMotion::Static),
                WaveTerm::planar(DVec2::X, 1.0).with_motion(WaveMotion::Static),
            ],
            SurfacePreset::Transverse => vec![
                WaveTerm::planar(along_y, 0.25).with_wavenumber_factor(2.0),
                WaveTerm::planar(oblique, 0.25)
                    .with_wavenumber_factor(2.0)
                    .with_phase_factor(1.0),
            ],
            SurfacePreset::Standing => vec![
                WaveTerm::planar(along_y, 1.0)
                    .with_wavenumber_factor(2.0)
                    .with_motion(WaveMotion::Standing),
                WaveTerm::planar(oblique, 1.0)
                    .with_wavenumber_factor(2.0)
                    .with_phase_factor(1.0)
                    .with_motion(WaveMotion::Standing),
            ],
            SurfacePreset::Flat => Vec::new(),
        }
    }

    /// Build the height field described by this preset.
    pub fn build(&self, waves: &WaveParameters) -> Box<dyn HeightField> {
        match self {
            SurfacePreset::Flat => Box::new(FlatSurface { level: waves.depth }),
            preset => Box::new(WaveSurface::new(preset.terms(), waves)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn picasso() -> WaveSurface {
        WaveSurface::new(SurfacePreset::Picasso.terms(), &WaveParameters::default())
    }

    #[test]
    fn test_temporal_phase() {
        assert!((temporal_phase(1.0, 0.25) - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(temporal_phase(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_picasso_at_origin() {
        let waves = WaveParameters::default();
        let surface = picasso();
        let k = waves.wavenumber();
        let expected = (0.0_f64).sin()
            + 0.5 * (k * (2.0_f64 * 200.0 * 200.0).sqrt()).sin()
            + 0.5 * (0.0_f64).sin()
            + waves.depth;
        assert!((surface.height(0.0, 0.0, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_height_stays_within_amplitude_envelope() {
        let surface = picasso();
        for i in 0..50 {
            let x = i as f64 * 17.3 - 300.0;
            let y = i as f64 * -9.1 + 120.0;
            let h = surface.height(x, y, i as f64 * 0.37);
            // Weights sum to 2.0
            assert!((h - 1400.0).abs() <= 2.0 + 1e-12, "h = {}", h);
        }
    }

    #[test]
    fn test_height_is_deterministic() {
        let surface = picasso();
        let a = surface.height(123.5, -42.0, 1.7);
        let b = surface.height(123.5, -42.0, 1.7);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_travelling_wave_shifts_with_phase() {
        let term = WaveTerm::planar(DVec2::X, 1.0);
        let k = 0.1;
        // Advancing the phase by k*dx matches moving back by dx
        let a = term.evaluate(DVec2::new(10.0, 0.0), k, 0.5, 0.0);
        let b = term.evaluate(DVec2::new(5.0, 0.0), k, 0.5 + 0.5, 0.0);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_standing_wave_vanishes_at_zero_phase() {
        let term = WaveTerm::planar(DVec2::Y, 1.0).with_motion(WaveMotion::Standing);
        assert!(term.evaluate(DVec2::new(3.0, 7.0), 0.2, 0.0, 0.0).abs() < 1e-15);
        assert!(term.evaluate(DVec2::new(3.0, 7.0), 0.2, PI, 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_term_ignores_phase() {
        let term = WaveTerm::radial(DVec2::ZERO, 1.0).with_motion(WaveMotion::Static);
        let a = term.evaluate(DVec2::new(4.0, 3.0), 0.3, 0.0, 0.0);
        let b = term.evaluate(DVec2::new(4.0, 3.0), 0.3, 2.1, 0.0);
        assert_eq!(a, b);
        assert!((a - 1.5_f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_phase_offset_multiple() {
        let term = WaveTerm::planar(DVec2::X, 1.0).with_phase_factor(2.0);
        let value = term.evaluate(DVec2::ZERO, 1.0, 0.0, FRAC_PI_2 / 2.0);
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_preset_is_constant() {
        let waves = WaveParameters::default();
        let surface = SurfacePreset::Flat.build(&waves);
        assert_eq!(surface.height(0.0, 0.0, 0.0), waves.depth);
        assert_eq!(surface.height(-50.0, 999.0, 3.0), waves.depth);
    }

    #[test]
    fn test_presets_have_terms() {
        assert_eq!(SurfacePreset::Picasso.terms().len(), 3);
        assert_eq!(SurfacePreset::Interference.terms().len(), 2);
        assert!(SurfacePreset::Flat.terms().is_empty());
        assert_eq!(SurfacePreset::default(), SurfacePreset::Picasso);
    }

    #[test]
    fn test_preset_serde_names() {
        let json = serde_json::to_string(&SurfacePreset::Transverse).unwrap();
        assert_eq!(json, "\"transverse\"");
        let parsed: SurfacePreset = serde_json::from_str("\"standing\"").unwrap();
        assert_eq!(parsed, SurfacePreset::Standing);
    }
}
