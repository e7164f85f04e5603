//! Refraction of vertical light rays through the water surface onto the floor.
//!
//! A vertical ray hitting the surface at a point with height gradient `grad h`
//! is bent by Snell's law and travels down to the floor at `depth`. In the
//! paraxial single-bounce model the lateral displacement is the gradient
//! scaled by
//!
//! ```text
//! k = depth * sqrt(1 / (n^2 * (1 + g^2) - g^2)),   g = |grad h|
//! ```
//!
//! and the ray lands at `(x, y) + grad h * k`. Each coordinate is offset by
//! one half and truncated toward zero, so positive landings round to the
//! nearest cell while landings in `(-1.5, 0.5)` all reach cell 0.
//! The gradient comes from forward finite differences of the height field.

use glam::DVec2;

use crate::config::SimulationConfig;
use crate::physics::surface::HeightField;
use crate::render::accumulation::AccumulationGrid;

/// Outcome of refracting one surface sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The ray reached a floor cell inside the grid
    Cell { x: i64, y: i64 },
    /// The ray reached the floor outside the grid; the sample is dropped
    OutOfBounds { x: i64, y: i64 },
    /// Grazing geometry (non-positive radicand) or a non-finite result; skipped
    Degenerate,
}

/// Maps surface points to the floor cells their refracted rays reach.
#[derive(Debug, Clone, Copy)]
pub struct RefractionMapper {
    /// Distance from the surface to the floor
    pub depth: f64,
    /// Refractive index of the water
    pub refractive_index: f64,
    /// Forward-difference step for the gradient
    pub derivative_step: f64,
}

impl RefractionMapper {
    pub fn new(depth: f64, refractive_index: f64, derivative_step: f64) -> Self {
        Self {
            depth,
            refractive_index,
            derivative_step,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.waves.depth,
            config.optics.refractive_index,
            config.optics.derivative_step,
        )
    }

    /// Surface gradient at `(x, y)` by forward differences.
    #[inline]
    pub fn gradient(&self, surface: &dyn HeightField, x: f64, y: f64, phase: f64) -> DVec2 {
        let h0 = surface.height(x, y, phase);
        let inv_step = 1.0 / self.derivative_step;
        DVec2::new(
            (surface.height(x + self.derivative_step, y, phase) - h0) * inv_step,
            (surface.height(x, y + self.derivative_step, phase) - h0) * inv_step,
        )
    }

    /// Lateral displacement factor for a gradient of magnitude `g`.
    ///
    /// Returns `None` when `n^2 * (1 + g^2) <= g^2`.
    #[inline]
    pub fn displacement_factor(&self, g: f64) -> Option<f64> {
        let n2 = self.refractive_index * self.refractive_index;
        let g2 = g * g;
        let radicand = n2 * (1.0 + g2) - g2;
        if radicand > 0.0 {
            Some(self.depth * (1.0 / radicand).sqrt())
        } else {
            None
        }
    }

    /// Floor point reached by the ray refracted at surface point `(x, y)`,
    /// without bounds checking.
    ///
    /// Coordinates are `trunc(v + 0.5)`: a raw landing of -1.2 reaches column 0,
    /// one of -1.6 reaches column -1.
    #[inline]
    pub fn floor_point(
        &self,
        surface: &dyn HeightField,
        x: f64,
        y: f64,
        phase: f64,
    ) -> Option<(i64, i64)> {
        let gradient = self.gradient(surface, x, y, phase);
        let k = self.displacement_factor(gradient.length())?;
        let target = (DVec2::new(x, y) + gradient * k + 0.5).trunc();
        if !target.is_finite() {
            return None;
        }
        Some((target.x as i64, target.y as i64))
    }

    /// Classify where the ray from `(x, y)` lands on a floor `width` cells wide.
    #[inline]
    pub fn landing(
        &self,
        surface: &dyn HeightField,
        x: f64,
        y: f64,
        phase: f64,
        width: u32,
    ) -> Landing {
        match self.floor_point(surface, x, y, phase) {
            None => Landing::Degenerate,
            Some((fx, fy)) => {
                let width = i64::from(width);
                if (0..width).contains(&fx) && (0..width).contains(&fy) {
                    Landing::Cell { x: fx, y: fy }
                } else {
                    Landing::OutOfBounds { x: fx, y: fy }
                }
            }
        }
    }

    /// Refract the sample at `(x, y)` and count it in `grid`.
    ///
    /// Increments at most one cell; out-of-bounds and degenerate samples leave
    /// the grid untouched.
    #[inline]
    pub fn map_to_floor(
        &self,
        surface: &dyn HeightField,
        x: f64,
        y: f64,
        phase: f64,
        grid: &mut AccumulationGrid,
    ) -> Landing {
        let landing = self.landing(surface, x, y, phase, grid.width());
        if let Landing::Cell { x, y } = landing {
            grid.increment(x, y);
        }
        landing
    }
}
