//! Physical models for the caustic renderer:
//! - Surface: water height field as a superposition of wave terms
//! - Refraction: Snell's-law mapping from surface points to floor cells

pub mod surface;
pub mod refraction;

pub use surface::{FlatSurface, HeightField, SurfacePreset, WaveSurface, WaveTerm};
pub use refraction::{Landing, RefractionMapper};
