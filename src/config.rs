//! Configuration module for the caustic renderer.
//!
//! This module defines the parameter groups for a run: the floor grid, the
//! wave surface, the optics of the refraction model, image output and the
//! batch scheduler. A configuration is fixed at startup and never mutated
//! while frames are being rendered.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::OutputFormat;
use crate::physics::surface::SurfacePreset;

/// Parameters defining the floor grid and the surface sampling lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridParameters {
    /// Width (and height) of the square floor grid in cells
    pub width: u32,

    /// Sampling margin around the floor; `None` derives `width / 8`
    #[serde(default)]
    pub margin: Option<u32>,

    /// Distance between neighbouring surface samples
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    1
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            width: 1024,
            margin: None,
            step: default_step(),
        }
    }
}

impl GridParameters {
    /// Effective sampling margin in cells.
    pub fn margin(&self) -> u32 {
        self.margin.unwrap_or(self.width / 8)
    }
}

/// Parameters defining the shape and motion of the water surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveParameters {
    /// Mean water depth above the floor (grid units)
    pub depth: f64,

    /// Wavelength before spatial scaling (grid units)
    pub wavelength: f64,

    /// Spatial scale multiplying the wavelength
    pub spatial_scale: f64,

    /// Vertical amplitude of the superposed waves
    pub amplitude: f64,

    /// Temporal frequency (cycles per unit of simulated time)
    pub frequency: f64,

    /// Phase offset FI, applied per wave term with its own multiple
    #[serde(default)]
    pub phase_offset: f64,

    /// Named surface shape
    #[serde(default)]
    pub preset: SurfacePreset,
}

impl Default for WaveParameters {
    fn default() -> Self {
        Self {
            depth: 1400.0,
            wavelength: 25.0,
            spatial_scale: 8.0,
            amplitude: 1.0,
            frequency: 1.0,
            phase_offset: 0.0,
            preset: SurfacePreset::default(),
        }
    }
}

impl WaveParameters {
    /// Base wavenumber `2 * PI / (wavelength * scale)`.
    pub fn wavenumber(&self) -> f64 {
        std::f64::consts::TAU / (self.wavelength * self.spatial_scale)
    }
}

/// Parameters of the refraction model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpticsParameters {
    /// Refractive index of water (~1.33)
    pub refractive_index: f64,

    /// Forward-difference step used for the surface gradient
    #[serde(default = "default_derivative_step")]
    pub derivative_step: f64,
}

fn default_derivative_step() -> f64 {
    1e-7
}

impl Default for OpticsParameters {
    fn default() -> Self {
        Self {
            refractive_index: 1.33,
            derivative_step: default_derivative_step(),
        }
    }
}

/// Parameters for writing rendered frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderParameters {
    /// Gray level added per ray landing, saturating at 255
    pub brightness: u32,

    /// File name prefix shared by every frame of a run
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Image format of written frames
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory receiving the frames
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_prefix() -> String {
    "run_1".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            brightness: 8,
            prefix: default_prefix(),
            format: OutputFormat::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Parameters for the batch scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParameters {
    /// Frames rendered concurrently in one batch
    pub max_workers: usize,

    /// Simulated time between consecutive frames
    pub time_step: f64,

    /// Simulated time of the first frame
    #[serde(default)]
    pub start_time: f64,

    /// Stop after this many frames; `None` runs until stopped
    #[serde(default)]
    pub max_frames: Option<u64>,

    /// Split each frame's rows across the rayon pool
    #[serde(default)]
    pub row_parallel: bool,
}

impl Default for SchedulerParameters {
    fn default() -> Self {
        Self {
            max_workers: 10,
            time_step: 0.01,
            start_time: 0.0,
            max_frames: None,
            row_parallel: false,
        }
    }
}

/// Complete run configuration combining all parameter groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Floor grid and sampling lattice
    #[serde(default)]
    pub grid: GridParameters,

    /// Water surface
    #[serde(default)]
    pub waves: WaveParameters,

    /// Refraction model
    #[serde(default)]
    pub optics: OpticsParameters,

    /// Frame output
    #[serde(default)]
    pub render: RenderParameters,

    /// Batch scheduling
    #[serde(default)]
    pub scheduler: SchedulerParameters,
}

impl SimulationConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing sections fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|error| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            error,
        })?;
        serde_json::from_str(&contents).map_err(|error| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }

    /// Save configuration to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents =
            serde_json::to_string_pretty(self).map_err(|error| ConfigError::Serialize { error })?;
        fs::write(path.as_ref(), contents).map_err(|error| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }

    /// Check that the parameters describe a renderable run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if self.grid.width == 0 {
            return invalid("grid width must be positive");
        }
        if self.grid.step == 0 {
            return invalid("sampling step must be positive");
        }

        let waves = &self.waves;
        for (name, value) in [
            ("depth", waves.depth),
            ("wavelength", waves.wavelength),
            ("spatial scale", waves.spatial_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }
        if !waves.amplitude.is_finite()
            || !waves.frequency.is_finite()
            || !waves.phase_offset.is_finite()
        {
            return invalid("wave amplitude, frequency and phase offset must be finite");
        }

        if !(self.optics.refractive_index.is_finite() && self.optics.refractive_index > 0.0) {
            return invalid("refractive index must be positive");
        }
        if !(self.optics.derivative_step.is_finite() && self.optics.derivative_step > 0.0) {
            return invalid("derivative step must be positive");
        }

        let scheduler = &self.scheduler;
        if scheduler.max_workers == 0 {
            return invalid("at least one worker is required");
        }
        if !(scheduler.time_step.is_finite() && scheduler.time_step > 0.0) {
            return invalid("time step must be positive");
        }
        // Frame names encode hundredths of a time unit.
        if scheduler.time_step * 100.0 < 1.0 - 1e-9 {
            return invalid("time step below 0.01 would give frames colliding names");
        }
        if !(scheduler.start_time.is_finite() && scheduler.start_time >= 0.0) {
            return invalid("start time must be non-negative");
        }
        if self.render.prefix.is_empty() {
            return invalid("frame prefix must not be empty");
        }

        Ok(())
    }

    /// Human-readable `label: value` dump of the active configuration.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let lines: [(&str, String); 16] = [
            ("Width", self.grid.width.to_string()),
            ("Margin", self.grid.margin().to_string()),
            ("Depth", self.waves.depth.to_string()),
            ("Amplitude", self.waves.amplitude.to_string()),
            ("Frequency", self.waves.frequency.to_string()),
            ("FI", self.waves.phase_offset.to_string()),
            ("Lambda", self.waves.wavelength.to_string()),
            ("Scale", self.waves.spatial_scale.to_string()),
            ("IND", self.optics.refractive_index.to_string()),
            ("Step", self.grid.step.to_string()),
            ("Derivate step", self.optics.derivative_step.to_string()),
            ("Brightness", self.render.brightness.to_string()),
            ("Workers", self.scheduler.max_workers.to_string()),
            ("Time step", self.scheduler.time_step.to_string()),
            ("Surface", self.waves.preset.name().to_string()),
            ("Format", self.render.format.extension().to_string()),
        ];
        for (label, value) in lines {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{}: \t{}", label, value);
        }
        out
    }

    /// Write [`summary`](Self::summary) to a file for later reference.
    ///
    /// The file is never read back.
    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.summary()).map_err(|error| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Error types for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error when reading or writing configuration files
    Io {
        path: std::path::PathBuf,
        error: std::io::Error,
    },
    /// JSON parsing error
    Parse {
        path: std::path::PathBuf,
        error: serde_json::Error,
    },
    /// JSON serialization error
    Serialize { error: serde_json::Error },
    /// Parameters that cannot describe a run
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, error } => {
                write!(
                    formatter,
                    "Failed to read/write config file '{}': {}",
                    path.display(),
                    error
                )
            }
            ConfigError::Parse { path, error } => {
                write!(
                    formatter,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    error
                )
            }
            ConfigError::Serialize { error } => {
                write!(formatter, "Failed to serialize config: {}", error)
            }
            ConfigError::Invalid(msg) => write!(formatter, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { error, .. } => Some(error),
            ConfigError::Parse { error, .. } => Some(error),
            ConfigError::Serialize { error } => Some(error),
            ConfigError::Invalid(_) => None,
        }
    }
}
