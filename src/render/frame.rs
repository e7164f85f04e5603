//! One simulated time step: sample the surface, refract every sample and
//! accumulate the landings into a fresh grid.

use rayon::prelude::*;

use crate::config::{GridParameters, SimulationConfig};
use crate::physics::refraction::{Landing, RefractionMapper};
use crate::physics::surface::{HeightField, temporal_phase};
use crate::render::accumulation::{AccumulationGrid, GridError};

/// Surface sample lattice `[start, end)` on both axes.
///
/// The lattice extends `margin` cells beyond the floor on every side, since
/// rays from just outside the visible floor can still bend onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingDomain {
    pub start: i64,
    pub end: i64,
    pub step: u32,
}

impl SamplingDomain {
    pub fn new(width: u32, margin: u32, step: u32) -> Self {
        Self {
            start: -i64::from(margin),
            end: i64::from(width) + i64::from(margin),
            step: step.max(1),
        }
    }

    pub fn from_grid(grid: &GridParameters) -> Self {
        Self::new(grid.width, grid.margin(), grid.step)
    }

    /// Sample coordinates along one axis.
    pub fn coordinates(&self) -> impl Iterator<Item = i64> + Clone + use<> {
        (self.start..self.end).step_by(self.step as usize)
    }

    /// Number of samples along one axis.
    pub fn axis_len(&self) -> u64 {
        let span = (self.end - self.start).max(0) as u64;
        span.div_ceil(u64::from(self.step))
    }

    /// Number of samples in the whole lattice.
    pub fn sample_count(&self) -> u64 {
        self.axis_len() * self.axis_len()
    }
}

/// What happened to the samples of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Surface points sampled
    pub samples: u64,
    /// Rays that reached a floor cell
    pub landed: u64,
    /// Rays that fell outside the floor
    pub dropped: u64,
    /// Samples skipped for grazing geometry
    pub degenerate: u64,
}

impl FrameStats {
    #[inline]
    fn record(&mut self, landing: Landing) {
        self.samples += 1;
        match landing {
            Landing::Cell { .. } => self.landed += 1,
            Landing::OutOfBounds { .. } => self.dropped += 1,
            Landing::Degenerate => self.degenerate += 1,
        }
    }

    fn merge(&mut self, other: &FrameStats) {
        self.samples += other.samples;
        self.landed += other.landed;
        self.dropped += other.dropped;
        self.degenerate += other.degenerate;
    }
}

/// A finished frame, ready for encoding.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// Position of the frame in the run
    pub index: u64,
    /// Simulated time of the frame
    pub time: f64,
    pub grid: AccumulationGrid,
    /// Gray level added per landing
    pub brightness: u32,
    pub stats: FrameStats,
}

/// Renders frames of one surface with a fixed mapper and lattice.
pub struct FrameJob<'a> {
    surface: &'a dyn HeightField,
    mapper: RefractionMapper,
    width: u32,
    domain: SamplingDomain,
    frequency: f64,
    brightness: u32,
    row_parallel: bool,
}

impl<'a> FrameJob<'a> {
    pub fn new(
        surface: &'a dyn HeightField,
        mapper: RefractionMapper,
        width: u32,
        domain: SamplingDomain,
        frequency: f64,
        brightness: u32,
    ) -> Self {
        Self {
            surface,
            mapper,
            width,
            domain,
            frequency,
            brightness,
            row_parallel: false,
        }
    }

    pub fn from_config(surface: &'a dyn HeightField, config: &SimulationConfig) -> Self {
        Self::new(
            surface,
            RefractionMapper::from_config(config),
            config.grid.width,
            SamplingDomain::from_grid(&config.grid),
            config.waves.frequency,
            config.render.brightness,
        )
        .with_row_parallel(config.scheduler.row_parallel)
    }

    /// Split the lattice rows across the rayon pool.
    pub fn with_row_parallel(mut self, row_parallel: bool) -> Self {
        self.row_parallel = row_parallel;
        self
    }

    pub fn domain(&self) -> SamplingDomain {
        self.domain
    }

    /// Render the frame at simulated `time`.
    ///
    /// Fails only when a grid cannot be allocated; no partial frame is produced.
    pub fn run(&self, index: u64, time: f64) -> Result<RenderedFrame, GridError> {
        let phase = temporal_phase(self.frequency, time);
        let (grid, stats) = if self.row_parallel {
            self.sample_parallel(phase)?
        } else {
            let mut grid = AccumulationGrid::new(self.width)?;
            let stats = self.sample_rows(self.domain.coordinates(), phase, &mut grid);
            (grid, stats)
        };

        Ok(RenderedFrame {
            index,
            time,
            grid,
            brightness: self.brightness,
            stats,
        })
    }

    fn sample_rows(
        &self,
        rows: impl Iterator<Item = i64>,
        phase: f64,
        grid: &mut AccumulationGrid,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        for y in rows {
            for x in self.domain.coordinates() {
                let landing = self
                    .mapper
                    .map_to_floor(self.surface, x as f64, y as f64, phase, grid);
                stats.record(landing);
            }
        }
        stats
    }

    /// Sample row bands on the rayon pool, summing band grids pairwise into
    /// the left-hand one.
    fn sample_parallel(&self, phase: f64) -> Result<(AccumulationGrid, FrameStats), GridError> {
        let rows: Vec<i64> = self.domain.coordinates().collect();
        let band = rows.len().div_ceil(rayon::current_num_threads()).max(1);

        let merged = rows
            .par_chunks(band)
            .map(|band_rows| -> Result<(AccumulationGrid, FrameStats), GridError> {
                let mut grid = AccumulationGrid::new(self.width)?;
                let stats = self.sample_rows(band_rows.iter().copied(), phase, &mut grid);
                Ok((grid, stats))
            })
            .try_reduce_with(|(mut grid, mut stats), (band_grid, band_stats)| {
                grid.merge(&band_grid)?;
                stats.merge(&band_stats);
                Ok((grid, stats))
            });

        match merged {
            Some(result) => result,
            None => Ok((AccumulationGrid::new(self.width)?, FrameStats::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::surface::{FlatSurface, SurfacePreset};

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.width = 48;
        config
    }

    #[test]
    fn test_sampling_domain() {
        let domain = SamplingDomain::new(1024, 128, 1);
        assert_eq!(domain.start, -128);
        assert_eq!(domain.end, 1152);
        assert_eq!(domain.axis_len(), 1280);
        assert_eq!(domain.sample_count(), 1280 * 1280);

        let stepped = SamplingDomain::new(10, 0, 3);
        assert_eq!(stepped.coordinates().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
        assert_eq!(stepped.axis_len(), 4);
    }

    #[test]
    fn test_flat_frame_counts_each_cell_once() {
        let flat = FlatSurface { level: 1400.0 };
        let job = FrameJob::new(
            &flat,
            RefractionMapper::new(1400.0, 1.33, 1e-7),
            4,
            SamplingDomain::new(4, 0, 1),
            1.0,
            8,
        );
        let frame = job.run(0, 0.0).unwrap();
        assert_eq!(frame.grid.counts(), &[1; 16]);
        assert_eq!(
            frame.stats,
            FrameStats {
                samples: 16,
                landed: 16,
                dropped: 0,
                degenerate: 0
            }
        );
    }

    #[test]
    fn test_flat_frame_with_margin_drops_outside() {
        let flat = FlatSurface { level: 1400.0 };
        let job = FrameJob::new(
            &flat,
            RefractionMapper::new(1400.0, 1.33, 1e-7),
            4,
            SamplingDomain::new(4, 2, 1),
            1.0,
            8,
        );
        let frame = job.run(0, 0.0).unwrap();
        // Per axis, -2 and 4..=5 fall outside while -1 truncates onto cell 0
        assert_eq!(frame.stats.samples, 64);
        assert_eq!(frame.stats.landed, 25);
        assert_eq!(frame.stats.dropped, 39);
        assert_eq!(frame.grid.total(), 25);
        assert_eq!(frame.grid.get(0, 0), 4);
        assert_eq!(frame.grid.get(0, 3), 2);
        assert_eq!(frame.grid.get(2, 0), 2);
        assert_eq!(frame.grid.get(3, 3), 1);

        let banded = job.with_row_parallel(true).run(0, 0.0).unwrap();
        assert_eq!(banded.grid, frame.grid);
        assert_eq!(banded.stats, frame.stats);
    }

    #[test]
    fn test_parallel_empty_domain_gives_empty_grid() {
        let flat = FlatSurface { level: 1400.0 };
        let job = FrameJob::new(
            &flat,
            RefractionMapper::new(1400.0, 1.33, 1e-7),
            0,
            SamplingDomain::new(0, 0, 1),
            1.0,
            8,
        )
        .with_row_parallel(true);
        let frame = job.run(0, 0.0).unwrap();
        assert_eq!(frame.grid.width(), 0);
        assert_eq!(frame.stats, FrameStats::default());
    }

    #[test]
    fn test_wave_frame_conserves_samples() {
        let config = small_config();
        let surface = SurfacePreset::Picasso.build(&config.waves);
        let job = FrameJob::from_config(surface.as_ref(), &config);
        let frame = job.run(3, 0.03).unwrap();

        let stats = frame.stats;
        assert_eq!(stats.samples, job.domain().sample_count());
        assert_eq!(stats.samples, stats.landed + stats.dropped + stats.degenerate);
        assert_eq!(frame.grid.total(), stats.landed);
        assert!(frame.grid.total() <= stats.samples);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.brightness, 8);
    }

    #[test]
    fn test_parallel_rows_match_sequential() {
        let config = small_config();
        let surface = SurfacePreset::Picasso.build(&config.waves);
        let sequential = FrameJob::from_config(surface.as_ref(), &config)
            .run(0, 0.12)
            .unwrap();
        let parallel = FrameJob::from_config(surface.as_ref(), &config)
            .with_row_parallel(true)
            .run(0, 0.12)
            .unwrap();
        assert_eq!(sequential.grid, parallel.grid);
        assert_eq!(sequential.stats, parallel.stats);
    }

    #[test]
    fn test_frames_differ_over_time() {
        let config = small_config();
        let surface = SurfacePreset::Picasso.build(&config.waves);
        let job = FrameJob::from_config(surface.as_ref(), &config);
        let a = job.run(0, 0.0).unwrap();
        let b = job.run(25, 0.25).unwrap();
        assert_ne!(a.grid, b.grid);
    }
}
