//! Frame file naming.
//!
//! Names carry the simulated time in hundredths, zero-padded to seven digits,
//! so a plain lexicographic sort of a run's files is its temporal order.

use super::OutputFormat;

/// Digits of the zero-padded time code
pub const TIME_CODE_WIDTH: usize = 7;

/// Simulated time in hundredths, rounded to the nearest integer.
pub fn time_code(time: f64) -> u64 {
    (time * 100.0).round().max(0.0) as u64
}

/// `{prefix}_{time code}.{ext}`, e.g. `run_1_0000042.bmp` for `t = 0.42`.
pub fn frame_file_name(prefix: &str, time: f64, format: OutputFormat) -> String {
    format!(
        "{}_{:0width$}.{}",
        prefix,
        time_code(time),
        format.extension(),
        width = TIME_CODE_WIDTH
    )
}
