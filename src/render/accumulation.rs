//! Floor accumulation grid.
//!
//! Each refracted ray that reaches the floor increments the counter of the
//! cell it lands in. Counters only grow while a frame is being sampled; the
//! grid is frozen once handed to a [`RenderedFrame`](crate::render::RenderedFrame).

/// Errors that can occur while setting up a grid
#[derive(Debug)]
pub enum GridError {
    /// The counter buffer could not be allocated
    Allocation { width: u32 },
    /// Grids of different widths cannot be merged
    WidthMismatch { expected: u32, actual: u32 },
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::Allocation { width } => {
                write!(f, "Failed to allocate {}x{} accumulation grid", width, width)
            }
            GridError::WidthMismatch { expected, actual } => {
                write!(f, "Grid width mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Square grid of landing counters stored in row-major order `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulationGrid {
    width: u32,
    counts: Vec<u32>,
}

impl AccumulationGrid {
    /// Create a zeroed `width x width` grid.
    pub fn new(width: u32) -> Result<Self, GridError> {
        let len = width as usize * width as usize;
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(len)
            .map_err(|_| GridError::Allocation { width })?;
        counts.resize(len, 0);
        Ok(Self { width, counts })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Whether `(x, y)` is a cell of this grid.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let width = i64::from(self.width);
        (0..width).contains(&x) && (0..width).contains(&y)
    }

    /// Count one landing at `(x, y)`. Returns `false` (and writes nothing)
    /// when the cell is outside the grid.
    #[inline]
    pub fn increment(&mut self, x: i64, y: i64) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        let index = self.index(x as u32, y as u32);
        self.counts[index] = self.counts[index].saturating_add(1);
        true
    }

    /// Counter at `(x, y)`.
    ///
    /// # Panics
    /// If the cell is outside the grid.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width && y < self.width, "cell ({}, {}) outside grid", x, y);
        self.counts[self.index(x, y)]
    }

    /// One row of counters, left to right.
    pub fn row(&self, y: u32) -> &[u32] {
        let start = self.index(0, y);
        &self.counts[start..start + self.width as usize]
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Largest counter.
    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Add another grid's counters into this one.
    pub fn merge(&mut self, other: &AccumulationGrid) -> Result<(), GridError> {
        if other.width != self.width {
            return Err(GridError::WidthMismatch {
                expected: self.width,
                actual: other.width,
            });
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine = mine.saturating_add(*theirs);
        }
        Ok(())
    }

    /// Gray level of a counter, `min(255, count * scale)`.
    #[inline]
    pub fn gray_level(count: u32, scale: u32) -> u8 {
        count.saturating_mul(scale).min(255) as u8
    }

    /// Gray level of the cell at `(x, y)`.
    #[inline]
    pub fn brightness(&self, x: u32, y: u32, scale: u32) -> u8 {
        Self::gray_level(self.get(x, y), scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_zeroed() {
        let grid = AccumulationGrid::new(16).unwrap();
        assert_eq!(grid.width(), 16);
        assert_eq!(grid.counts().len(), 256);
        assert_eq!(grid.total(), 0);
        assert_eq!(grid.max(), 0);
    }

    #[test]
    fn test_increment_in_bounds() {
        let mut grid = AccumulationGrid::new(4).unwrap();
        assert!(grid.increment(3, 0));
        assert!(grid.increment(3, 0));
        assert!(grid.increment(0, 3));
        assert_eq!(grid.get(3, 0), 2);
        assert_eq!(grid.get(0, 3), 1);
        assert_eq!(grid.row(0), &[0, 0, 0, 2]);
        assert_eq!(grid.total(), 3);
        assert_eq!(grid.max(), 2);
    }

    #[test]
    fn test_increment_out_of_bounds_is_noop() {
        let mut grid = AccumulationGrid::new(4).unwrap();
        assert!(!grid.increment(-1, 3));
        assert!(!grid.increment(4, 0));
        assert!(!grid.increment(0, 4));
        assert!(!grid.increment(i64::MIN, i64::MAX));
        assert_eq!(grid.total(), 0);
    }

    #[test]
    fn test_merge() {
        let mut a = AccumulationGrid::new(2).unwrap();
        let mut b = AccumulationGrid::new(2).unwrap();
        a.increment(0, 0);
        b.increment(0, 0);
        b.increment(1, 1);
        a.merge(&b).unwrap();
        assert_eq!(a.counts(), &[2, 0, 0, 1]);

        let c = AccumulationGrid::new(3).unwrap();
        assert!(matches!(a.merge(&c), Err(GridError::WidthMismatch { .. })));
    }

    #[test]
    fn test_gray_level_saturates() {
        assert_eq!(AccumulationGrid::gray_level(0, 8), 0);
        assert_eq!(AccumulationGrid::gray_level(1, 8), 8);
        assert_eq!(AccumulationGrid::gray_level(31, 8), 248);
        assert_eq!(AccumulationGrid::gray_level(32, 8), 255);
        assert_eq!(AccumulationGrid::gray_level(u32::MAX, u32::MAX), 255);
    }

    #[test]
    #[should_panic]
    fn test_get_outside_panics() {
        let grid = AccumulationGrid::new(2).unwrap();
        grid.get(2, 0);
    }
}
