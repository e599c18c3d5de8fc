//! Per-channel mean/std normalization.

use ndarray::{Array3, ArrayView3, Axis};

use crate::error::TransformError;

use super::{to_chw, PatchTransform};

/// Default per-channel mean, ImageNet statistics on the 0-255 pixel scale.
pub const DEFAULT_MEAN: [f32; 3] = [123.675, 116.28, 103.53];

/// Default per-channel standard deviation, ImageNet statistics on the 0-255 pixel scale.
pub const DEFAULT_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Converts a `(h, w, c)` patch to `(c, h, w)` and normalizes each channel
/// as `(value - mean[c]) / std[c]`.
///
/// Pixel values are used on their original scale; no implicit division by
/// 255 takes place, so `mean` and `std` must be given on the same scale as
/// the image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePreprocess {
    /// Per-channel multiplier, `1 / std`
    alpha: Vec<f32>,
    /// Per-channel offset, `-mean / std`
    beta: Vec<f32>,
}

impl ImagePreprocess {
    /// Create a preprocessor from per-channel statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * `mean` is empty or its length differs from `std`
    /// * any standard deviation is not a positive finite number
    /// * any mean is not finite
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self, TransformError> {
        if mean.is_empty() {
            return Err(TransformError::InvalidParameter {
                message: "mean must have at least one channel".to_string(),
            });
        }
        if mean.len() != std.len() {
            return Err(TransformError::InvalidParameter {
                message: format!(
                    "mean has {} channels but std has {}",
                    mean.len(),
                    std.len()
                ),
            });
        }
        for (i, &s) in std.iter().enumerate() {
            if !(s.is_finite() && s > 0.0) {
                return Err(TransformError::InvalidParameter {
                    message: format!("std at index {i} must be positive and finite, got {s}"),
                });
            }
        }
        if let Some((i, m)) = mean.iter().enumerate().find(|(_, m)| !m.is_finite()) {
            return Err(TransformError::InvalidParameter {
                message: format!("mean at index {i} is not finite: {m}"),
            });
        }

        let alpha = std.iter().map(|s| 1.0 / s).collect();
        let beta = mean.iter().zip(std).map(|(m, s)| -m / s).collect();
        Ok(Self { alpha, beta })
    }

    /// Number of channels this preprocessor expects.
    pub fn channels(&self) -> usize {
        self.alpha.len()
    }

    /// Normalize a single pixel given as per-channel values.
    pub fn normalize_pixel(&self, pixel: &[f32]) -> Result<Vec<f32>, TransformError> {
        if pixel.len() != self.channels() {
            return Err(TransformError::ChannelMismatch {
                expected: self.channels(),
                actual: pixel.len(),
            });
        }
        Ok(pixel
            .iter()
            .zip(self.alpha.iter().zip(&self.beta))
            .map(|(v, (a, b))| v * a + b)
            .collect())
    }
}

impl Default for ImagePreprocess {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_STD.iter().map(|s| 1.0 / s).collect(),
            beta: DEFAULT_MEAN
                .iter()
                .zip(DEFAULT_STD.iter())
                .map(|(m, s)| -m / s)
                .collect(),
        }
    }
}

impl PatchTransform for ImagePreprocess {
    fn apply(&self, patch: ArrayView3<'_, f32>) -> Result<Array3<f32>, TransformError> {
        if patch.is_empty() {
            return Err(TransformError::EmptyPatch);
        }
        let channels = patch.len_of(Axis(2));
        if channels != self.channels() {
            return Err(TransformError::ChannelMismatch {
                expected: self.channels(),
                actual: channels,
            });
        }

        let mut chw = to_chw(patch);
        for (mut plane, (a, b)) in chw
            .axis_iter_mut(Axis(0))
            .zip(self.alpha.iter().zip(&self.beta))
        {
            plane.mapv_inplace(|v| v * a + b);
        }
        Ok(chw)
    }
}

// =============================================================================
// Tests
// =============================================================================
