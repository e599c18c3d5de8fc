//! Patch transforms.
//!
//! A transform turns a raw image region, laid out `(height, width, channels)`,
//! into the `(channels, height', width')` tensor a model consumes. The engine
//! calls the transform once per window, sequentially, so implementations only
//! need to be safe for repeated use through a shared reference.
//!
//! # Components
//!
//! - [`PatchTransform`]: the transform capability consumed by the engine
//! - [`ToChw`]: layout conversion only
//! - [`ImagePreprocess`]: layout conversion plus per-channel mean/std normalization
//! - [`divisible_pad`]: origin-anchored padding to a size divisor, applied by the
//!   engine after the transform

mod normalize;
mod pad;

use ndarray::{Array3, ArrayView3};

use crate::error::TransformError;

pub use normalize::{ImagePreprocess, DEFAULT_MEAN, DEFAULT_STD};
pub use pad::{divisible_pad, padded_len};

/// Converts a raw `(h, w, c)` patch into a `(c, h', w')` model input.
///
/// `h' >= h` and `w' >= w`; any extra rows/columns must sit below/right of
/// the patch content so that cropping `[..h, ..w]` recovers it.
///
/// Closures with the matching signature implement this trait:
///
/// ```
/// use ndarray::{Array3, ArrayView3};
/// use slidewin::transform::PatchTransform;
/// use slidewin::TransformError;
///
/// let halve = |patch: ArrayView3<'_, f32>| -> Result<Array3<f32>, TransformError> {
///     Ok(patch.permuted_axes([2, 0, 1]).mapv(|v| v * 0.5))
/// };
/// let out = halve.apply(Array3::from_elem((2, 3, 1), 4.0).view()).unwrap();
/// assert_eq!(out.shape(), &[1, 2, 3]);
/// ```
pub trait PatchTransform: Send + Sync {
    fn apply(&self, patch: ArrayView3<'_, f32>) -> Result<Array3<f32>, TransformError>;
}

impl<F> PatchTransform for F
where
    F: Fn(ArrayView3<'_, f32>) -> Result<Array3<f32>, TransformError> + Send + Sync,
{
    fn apply(&self, patch: ArrayView3<'_, f32>) -> Result<Array3<f32>, TransformError> {
        self(patch)
    }
}

/// Reorders a `(h, w, c)` patch into `(c, h, w)` without touching values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToChw;

impl PatchTransform for ToChw {
    fn apply(&self, patch: ArrayView3<'_, f32>) -> Result<Array3<f32>, TransformError> {
        if patch.is_empty() {
            return Err(TransformError::EmptyPatch);
        }
        Ok(to_chw(patch))
    }
}

/// Standard-layout `(c, h, w)` copy of a `(h, w, c)` view.
pub(crate) fn to_chw(patch: ArrayView3<'_, f32>) -> Array3<f32> {
    patch.permuted_axes([2, 0, 1]).as_standard_layout().into_owned()
}
