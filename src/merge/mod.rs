//! Overlap-averaging accumulator.
//!
//! Per-window predictions are merged into a full-image result by summing
//! them into a `(num_classes, H, W)` buffer and counting, per pixel, how many
//! windows contributed. The merged score is `sum / count`.
//!
//! Every per-pixel sum is exact. A sum lives in `f64` while each addition is
//! exact there; once one rounds, the cell moves to an `ExactSum` kept on the
//! side. `finalize` rounds each exact sum to `f64` before dividing, so the
//! merged result is bit-identical whatever order windows are added in.

mod exact;

use std::collections::HashMap;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::error::MergeError;
use crate::window::Window;

use exact::{two_sum, ExactSum};

/// Running sum and overlap count over one image.
#[derive(Debug, Clone)]
pub struct Accumulator {
    /// `f64` sums; `NaN` marks a cell held in `exact`.
    sum: Array3<f64>,
    count: Array2<u32>,
    /// Cells whose sum no longer fits an `f64`, keyed by flat index.
    exact: HashMap<usize, ExactSum>,
}

impl Accumulator {
    /// Zero-initialized buffers for an image of `height x width` pixels.
    pub fn new(num_classes: usize, height: usize, width: usize) -> Self {
        Self {
            sum: Array3::zeros((num_classes, height, width)),
            count: Array2::zeros((height, width)),
            exact: HashMap::new(),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.sum.len_of(Axis(0))
    }

    /// Image size as `(height, width)`.
    pub fn image_size(&self) -> (usize, usize) {
        self.count.dim()
    }

    /// Per-pixel number of predictions added so far.
    pub fn count(&self) -> ArrayView2<'_, u32> {
        self.count.view()
    }

    /// Add a `(num_classes, h, w)` prediction over `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is outside the image, or if the
    /// prediction's class count or spatial shape does not match.
    pub fn add(&mut self, prediction: ArrayView3<'_, f32>, window: Window) -> Result<(), MergeError> {
        let (height, width) = self.image_size();
        if !window.fits_within(height, width) {
            return Err(MergeError::WindowOutOfBounds {
                window,
                height,
                width,
            });
        }

        let (classes, h, w) = prediction.dim();
        if classes != self.num_classes() {
            return Err(MergeError::ClassCountMismatch {
                expected: self.num_classes(),
                actual: classes,
            });
        }
        if (h, w) != window.shape() {
            return Err(MergeError::ShapeMismatch {
                expected: window.shape(),
                actual: (h, w),
            });
        }

        let Window { x1, y1, x2, y2 } = window;
        let exact = &mut self.exact;
        Zip::indexed(self.sum.slice_mut(s![.., y1..y2, x1..x2]))
            .and(&prediction)
            .for_each(|(c, y, x), acc, &p| {
                let key = (c * height + y1 + y) * width + x1 + x;
                add_cell(acc, exact, key, f64::from(p));
            });
        self.count
            .slice_mut(s![y1..y2, x1..x2])
            .mapv_inplace(|c| c + 1);

        Ok(())
    }

    /// Divide the sums by the overlap counts.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Uncovered`] if any pixel never received a
    /// prediction, reporting the first such pixel in row-major order.
    pub fn finalize(self) -> Result<Array3<f32>, MergeError> {
        let uncovered = self.count.iter().filter(|&&c| c == 0).count();
        if uncovered > 0 {
            let (y, x) = self
                .count
                .indexed_iter()
                .find(|(_, &c)| c == 0)
                .map(|(idx, _)| idx)
                .unwrap_or_default();
            return Err(MergeError::Uncovered { x, y, uncovered });
        }

        let (height, width) = self.image_size();
        let mut merged = Array3::<f32>::zeros(self.sum.raw_dim());
        Zip::indexed(&mut merged)
            .and(&self.sum)
            .for_each(|(c, y, x), out, &s| {
                let total = if s.is_nan() {
                    self.exact
                        .get(&((c * height + y) * width + x))
                        .map_or(s, ExactSum::to_f64)
                } else {
                    s
                };
                *out = (total / f64::from(self.count[[y, x]])) as f32;
            });
        Ok(merged)
    }
}

/// Add `value` to one cell, moving the cell to an exact sum on the first
/// addition that rounds.
fn add_cell(acc: &mut f64, exact: &mut HashMap<usize, ExactSum>, key: usize, value: f64) {
    if acc.is_nan() && exact.contains_key(&key) {
        if value.is_finite() {
            if let Some(cell) = exact.get_mut(&key) {
                cell.add(value);
            }
        } else {
            // A non-finite term decides the sum on its own
            exact.remove(&key);
            *acc = value;
        }
        return;
    }
    if !(acc.is_finite() && value.is_finite()) {
        *acc += value;
        return;
    }

    let (sum, err) = two_sum(*acc, value);
    if err == 0.0 {
        *acc = sum;
    } else {
        let mut cell = ExactSum::default();
        cell.add(*acc);
        cell.add(value);
        exact.insert(key, cell);
        *acc = f64::NAN;
    }
}

// =============================================================================
// Tests
// =============================================================================
