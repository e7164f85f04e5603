//! Caustic Waves Library
//!
//! Renders the caustic pattern cast on a floor by light refracted through a
//! time-varying water surface:
//! - Closed-form wave surface and finite-difference refraction
//! - Per-frame accumulation grids encoded as grayscale images
//! - Batched parallel rendering of successive time steps

pub mod config;
pub mod physics;
pub mod render;
pub mod export;
pub mod scheduler;

pub use config::SimulationConfig;
pub use scheduler::BatchScheduler;
