//! Batch scheduling of frame jobs.
//!
//! Frames are rendered in batches of at most `max_workers` concurrent jobs.
//! Each batch is a hard barrier: every job of batch `n` has finished before
//! any job of batch `n + 1` is spawned. This bounds the number of frames in
//! flight without a work queue, at the cost of one slow frame holding back
//! the next batch.
//!
//! Simulated time is owned by the scheduler thread through a [`TimeCursor`];
//! each job receives its own copy of the time when it is spawned.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SimulationConfig;
use crate::export::{self, ExportError, OutputFormat};
use crate::physics::surface::HeightField;
use crate::render::{FrameJob, FrameStats, GridError, RenderedFrame};

/// Monotonic simulated-time counter.
///
/// Times form the exact arithmetic sequence `start + index * step` rather
/// than a running sum, so late frames carry no accumulated rounding drift.
#[derive(Debug, Clone)]
pub struct TimeCursor {
    start: f64,
    step: f64,
    next_index: u64,
}

impl TimeCursor {
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            start,
            step,
            next_index: 0,
        }
    }

    /// Time of frame `index`.
    pub fn time_of(&self, index: u64) -> f64 {
        self.start + index as f64 * self.step
    }

    /// Hand out the next frame index and its time.
    pub fn advance(&mut self) -> (u64, f64) {
        let index = self.next_index;
        self.next_index += 1;
        (index, self.time_of(index))
    }

    /// Frames handed out so far.
    pub fn dispatched(&self) -> u64 {
        self.next_index
    }
}

/// Destination of finished frames.
///
/// Called from worker threads, possibly for several frames at once, but
/// never twice for the same frame.
pub trait FrameSink: Sync {
    /// Consume a frame, returning the path written if any.
    fn consume(&self, frame: &RenderedFrame) -> Result<Option<PathBuf>, ExportError>;
}

/// Writes every frame as an image file in a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    prefix: String,
    format: OutputFormat,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            format,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.render.output_dir.clone(),
            config.render.prefix.clone(),
            config.render.format,
        )
    }
}

impl FrameSink for FileSink {
    fn consume(&self, frame: &RenderedFrame) -> Result<Option<PathBuf>, ExportError> {
        export::write_frame(frame, &self.dir, &self.prefix, self.format).map(Some)
    }
}

/// Why a frame job produced no output
#[derive(Debug)]
pub enum JobError {
    /// The accumulation grid could not be set up; the frame is lost
    Grid(GridError),
    /// The frame was rendered but could not be written
    Export(ExportError),
    /// The worker thread panicked
    Panicked,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Grid(e) => write!(f, "Frame aborted: {}", e),
            JobError::Export(e) => write!(f, "Frame not written: {}", e),
            JobError::Panicked => write!(f, "Frame worker panicked"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Grid(e) => Some(e),
            JobError::Export(e) => Some(e),
            JobError::Panicked => None,
        }
    }
}

/// Output of a successful frame job
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub stats: FrameStats,
    pub path: Option<PathBuf>,
}

/// What one job did and when.
#[derive(Debug)]
pub struct FrameReport {
    pub index: u64,
    pub time: f64,
    pub started: Instant,
    pub finished: Instant,
    pub result: Result<FrameOutput, JobError>,
}

/// All jobs of one batch, in dispatch order.
#[derive(Debug)]
pub struct BatchReport {
    /// Zero-based batch number
    pub number: u64,
    pub frames: Vec<FrameReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Latest finish time of any job in the batch.
    pub fn last_finished(&self) -> Option<Instant> {
        self.frames.iter().map(|f| f.finished).max()
    }

    /// Earliest start time of any job in the batch.
    pub fn first_started(&self) -> Option<Instant> {
        self.frames.iter().map(|f| f.started).min()
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    /// Frames rendered and consumed without error
    pub frames: u64,
    /// Frames aborted or not written
    pub failed: u64,
    /// Samples skipped for grazing geometry across all frames
    pub degenerate_samples: u64,
}

/// Dispatches frame jobs in fixed-width batches.
pub struct BatchScheduler {
    config: SimulationConfig,
    surface: Box<dyn HeightField>,
}

impl BatchScheduler {
    /// Scheduler rendering the configured surface preset.
    pub fn new(config: SimulationConfig) -> Self {
        let surface = config.waves.preset.build(&config.waves);
        Self { config, surface }
    }

    /// Scheduler rendering an arbitrary height field.
    pub fn with_surface(config: SimulationConfig, surface: Box<dyn HeightField>) -> Self {
        Self { config, surface }
    }

    /// Render batches until `max_frames` frames were dispatched or `stop` is set.
    ///
    /// `stop` is checked between batches; a batch in flight always completes.
    /// `on_batch` sees every batch report once its barrier has been passed.
    pub fn run<S, F>(&self, sink: &S, stop: &AtomicBool, mut on_batch: F) -> RunSummary
    where
        S: FrameSink + ?Sized,
        F: FnMut(&BatchReport),
    {
        let scheduler = &self.config.scheduler;
        let job = FrameJob::from_config(self.surface.as_ref(), &self.config);
        let mut cursor = TimeCursor::new(scheduler.start_time, scheduler.time_step);
        let mut summary = RunSummary::default();

        log::info!(
            "Rendering {} frames of {}x{} in batches of {}",
            scheduler
                .max_frames
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
            self.config.grid.width,
            self.config.grid.width,
            scheduler.max_workers
        );

        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("Stop requested, ending after {} frames", cursor.dispatched());
                break;
            }
            let batch_size = match scheduler.max_frames {
                Some(max) => {
                    let remaining = max.saturating_sub(cursor.dispatched());
                    if remaining == 0 {
                        break;
                    }
                    remaining.min(scheduler.max_workers as u64) as usize
                }
                None => scheduler.max_workers,
            };

            let report = Self::run_batch(&job, sink, &mut cursor, summary.batches, batch_size);
            Self::tally(&report, &mut summary);
            on_batch(&report);
        }

        log::info!(
            "Run finished: {} batches, {} frames written, {} failed",
            summary.batches,
            summary.frames,
            summary.failed
        );
        summary
    }

    fn run_batch<S: FrameSink + ?Sized>(
        job: &FrameJob<'_>,
        sink: &S,
        cursor: &mut TimeCursor,
        number: u64,
        batch_size: usize,
    ) -> BatchReport {
        let started = Instant::now();

        let frames = thread::scope(|scope| {
            let handles: Vec<_> = (0..batch_size)
                .map(|_| {
                    let (index, time) = cursor.advance();
                    let handle = scope.spawn(move || Self::run_job(job, sink, index, time));
                    (index, time, handle)
                })
                .collect();

            // Barrier: join every job of the batch.
            handles
                .into_iter()
                .map(|(index, time, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        let now = Instant::now();
                        FrameReport {
                            index,
                            time,
                            started: now,
                            finished: now,
                            result: Err(JobError::Panicked),
                        }
                    })
                })
                .collect::<Vec<_>>()
        });

        let report = BatchReport {
            number,
            frames,
            elapsed: started.elapsed(),
        };
        log::info!(
            "Batch {} done: {} workers in {:.2?}",
            number,
            report.frames.len(),
            report.elapsed
        );
        report
    }

    fn run_job<S: FrameSink + ?Sized>(
        job: &FrameJob<'_>,
        sink: &S,
        index: u64,
        time: f64,
    ) -> FrameReport {
        let started = Instant::now();
        let result = job
            .run(index, time)
            .map_err(JobError::Grid)
            .and_then(|frame| {
                let path = sink.consume(&frame).map_err(JobError::Export)?;
                Ok(FrameOutput {
                    stats: frame.stats,
                    path,
                })
            });
        let finished = Instant::now();

        match &result {
            Ok(output) => log::debug!(
                "worker[{}] t={:.2}: {} of {} samples landed in {:.2?}{}",
                index,
                time,
                output.stats.landed,
                output.stats.samples,
                finished - started,
                output
                    .path
                    .as_ref()
                    .map_or_else(String::new, |p| format!(", wrote {}", p.display()))
            ),
            Err(e) => log::error!("worker[{}] t={:.2}: {}", index, time, e),
        }

        FrameReport {
            index,
            time,
            started,
            finished,
            result,
        }
    }

    fn tally(report: &BatchReport, summary: &mut RunSummary) {
        summary.batches += 1;
        for frame in &report.frames {
            match &frame.result {
                Ok(output) => {
                    summary.frames += 1;
                    summary.degenerate_samples += output.stats.degenerate;
                    if output.stats.degenerate > 0 {
                        log::warn!(
                            "Frame {} skipped {} samples with grazing refraction",
                            frame.index,
                            output.stats.degenerate
                        );
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingSink {
        seen: Mutex<Vec<(u64, u64)>>,
    }

    impl FrameSink for CountingSink {
        fn consume(&self, frame: &RenderedFrame) -> Result<Option<PathBuf>, ExportError> {
            self.seen
                .lock()
                .unwrap()
                .push((frame.index, frame.grid.total()));
            Ok(None)
        }
    }

    fn tiny_config(frames: Option<u64>, workers: usize) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.width = 8;
        config.scheduler.max_frames = frames;
        config.scheduler.max_workers = workers;
        config
    }

    #[test]
    fn test_time_cursor_sequence() {
        let mut cursor = TimeCursor::new(0.5, 0.01);
        assert_eq!(cursor.advance(), (0, 0.5));
        let (index, time) = cursor.advance();
        assert_eq!(index, 1);
        assert!((time - 0.51).abs() < 1e-12);
        assert_eq!(cursor.dispatched(), 2);
        assert_eq!(cursor.time_of(1000), 0.5 + 1000.0 * 0.01);
    }

    #[test]
    fn test_partial_last_batch() {
        let scheduler = BatchScheduler::new(tiny_config(Some(7), 3));
        let sink = CountingSink {
            seen: Mutex::new(Vec::new()),
        };
        let stop = AtomicBool::new(false);
        let mut sizes = Vec::new();
        let summary = scheduler.run(&sink, &stop, |batch| sizes.push(batch.frames.len()));

        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.frames, 7);
        assert_eq!(summary.failed, 0);

        let mut indices: Vec<u64> = sink.seen.lock().unwrap().iter().map(|s| s.0).collect();
        indices.sort();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_stop_flag_ends_after_current_batch() {
        let scheduler = BatchScheduler::new(tiny_config(None, 2));
        let sink = CountingSink {
            seen: Mutex::new(Vec::new()),
        };
        let stop = AtomicBool::new(false);
        let summary = scheduler.run(&sink, &stop, |batch| {
            if batch.number == 1 {
                stop.store(true, Ordering::SeqCst);
            }
        });
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.frames, 4);
    }

    #[test]
    fn test_stop_before_start_renders_nothing() {
        let scheduler = BatchScheduler::new(tiny_config(None, 2));
        let sink = CountingSink {
            seen: Mutex::new(Vec::new()),
        };
        let stop = AtomicBool::new(true);
        let summary = scheduler.run(&sink, &stop, |_| {});
        assert_eq!(summary, RunSummary::default());
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_job_error_display() {
        let error = JobError::Grid(GridError::Allocation { width: 4 });
        assert_eq!(
            error.to_string(),
            "Frame aborted: Failed to allocate 4x4 accumulation grid"
        );
    }

    #[test]
    fn test_reports_carry_written_paths() {
        struct NamingSink;
        impl FrameSink for NamingSink {
            fn consume(&self, frame: &RenderedFrame) -> Result<Option<PathBuf>, ExportError> {
                Ok(Some(PathBuf::from(format!("frame_{}.bmp", frame.index))))
            }
        }

        let scheduler = BatchScheduler::new(tiny_config(Some(3), 2));
        let stop = AtomicBool::new(false);
        let mut paths = Vec::new();
        scheduler.run(&NamingSink, &stop, |batch| {
            for report in &batch.frames {
                let output = report.result.as_ref().unwrap();
                paths.push(output.path.clone());
            }
        });

        assert_eq!(
            paths,
            vec![
                Some(PathBuf::from("frame_0.bmp")),
                Some(PathBuf::from("frame_1.bmp")),
                Some(PathBuf::from("frame_2.bmp")),
            ]
        );
    }
}
