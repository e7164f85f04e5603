//! CPU rendering of caustic frames:
//! - Accumulation: per-frame grid of floor landing counters
//! - Frame: samples the surface for one time step into a fresh grid

pub mod accumulation;
pub mod frame;

pub use accumulation::{AccumulationGrid, GridError};
pub use frame::{FrameJob, FrameStats, RenderedFrame, SamplingDomain};
