//! Window and window-set value types.

use std::fmt;

use ndarray::{s, Array2};
use serde::Serialize;

// =============================================================================
// Window
// =============================================================================

/// An axis-aligned rectangle in pixel coordinates.
///
/// Coordinates are half-open on the high end: the window covers columns
/// `x1..x2` and rows `y1..y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Window {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

impl Window {
    pub const fn new(x1: usize, y1: usize, x2: usize, y2: usize) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Window width in pixels.
    #[inline]
    pub const fn width(&self) -> usize {
        self.x2 - self.x1
    }

    /// Window height in pixels.
    #[inline]
    pub const fn height(&self) -> usize {
        self.y2 - self.y1
    }

    /// Spatial shape as `(height, width)`.
    #[inline]
    pub const fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Whether the pixel at column `x`, row `y` lies inside the window.
    #[inline]
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Whether the window fits inside an image of the given size.
    #[inline]
    pub const fn fits_within(&self, height: usize, width: usize) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2 && self.x2 <= width && self.y2 <= height
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

impl From<Window> for [usize; 4] {
    fn from(w: Window) -> Self {
        [w.x1, w.y1, w.x2, w.y2]
    }
}

// =============================================================================
// Window Set
// =============================================================================

/// The ordered windows covering one image for one patch/stride configuration.
///
/// Produced by [`sliding_window`](super::sliding_window). Every pixel of the
/// image lies in at least one window, and windows are listed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSet {
    windows: Vec<Window>,
    height: usize,
    width: usize,
    patch_size: (usize, usize),
    stride: usize,
}

impl WindowSet {
    pub(crate) fn new(
        windows: Vec<Window>,
        height: usize,
        width: usize,
        patch_size: (usize, usize),
        stride: usize,
    ) -> Self {
        Self {
            windows,
            height,
            width,
            patch_size,
            stride,
        }
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Window> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Image size as `(height, width)`.
    pub fn image_size(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Configured patch size as `(height, width)`, before clipping to the image.
    pub fn patch_size(&self) -> (usize, usize) {
        self.patch_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of windows covering each pixel, shape `(height, width)`.
    pub fn coverage_counts(&self) -> Array2<u32> {
        let mut counts = Array2::<u32>::zeros((self.height, self.width));
        for w in &self.windows {
            counts
                .slice_mut(s![w.y1..w.y2, w.x1..w.x2])
                .mapv_inplace(|c| c + 1);
        }
        counts
    }

    /// Summary statistics over the window layout.
    pub fn stats(&self) -> PlanStats {
        let counts = self.coverage_counts();
        let min_coverage = counts.iter().copied().min().unwrap_or(0);
        let max_coverage = counts.iter().copied().max().unwrap_or(0);
        let overlapped = counts.iter().filter(|&&c| c > 1).count();

        let mut rows: Vec<usize> = self.windows.iter().map(|w| w.y1).collect();
        rows.dedup();
        let mut cols: Vec<usize> = self.windows.iter().map(|w| w.x1).collect();
        cols.sort_unstable();
        cols.dedup();

        PlanStats {
            height: self.height,
            width: self.width,
            patch_height: self.patch_size.0,
            patch_width: self.patch_size.1,
            stride: self.stride,
            windows: self.windows.len(),
            rows: rows.len(),
            cols: cols.len(),
            min_coverage,
            max_coverage,
            overlapped_pixels: overlapped,
        }
    }
}

impl<'a> IntoIterator for &'a WindowSet {
    type Item = &'a Window;
    type IntoIter = std::slice::Iter<'a, Window>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}

// =============================================================================
// Plan Statistics
// =============================================================================

/// Layout statistics for a window set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    pub height: usize,
    pub width: usize,
    pub patch_height: usize,
    pub patch_width: usize,
    pub stride: usize,
    pub windows: usize,
    pub rows: usize,
    pub cols: usize,
    /// Smallest number of windows covering any pixel (at least 1 for a valid plan)
    pub min_coverage: u32,
    /// Largest number of windows covering any pixel
    pub max_coverage: u32,
    /// Pixels covered by more than one window
    pub overlapped_pixels: usize,
}

// =============================================================================
// Tests
// =============================================================================
