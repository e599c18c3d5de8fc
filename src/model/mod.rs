//! Prediction model abstraction.
//!
//! The engine never looks inside a model. Anything that maps a
//! `(1, channels, h, w)` input to a `(1, num_classes, h, w)` score tensor can
//! be plugged in by implementing [`SegmentationModel`].
//!
//! Models backed by a device allocator can return cached memory in
//! [`SegmentationModel::release_cache`]. The engine wraps every per-window
//! prediction in a [`CacheReleaseGuard`], so the release runs once per window
//! whether the prediction succeeds, fails, or a later step bails out.

mod palette;

use ndarray::{Array4, ArrayView4};

use crate::error::ModelError;

pub use palette::{PaletteModel, DEFAULT_TEMPERATURE};

/// A dense prediction model used in inference mode.
pub trait SegmentationModel {
    /// Predict per-class scores for a batch of normalized patches.
    ///
    /// Input is `(n, channels, h, w)`; output must be `(n, num_classes, h, w)`.
    /// Implementations must not track gradients or apply training-time
    /// stochastic behaviour.
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError>;

    /// Release transient memory held by the last prediction.
    ///
    /// Called synchronously after every window. The default does nothing.
    fn release_cache(&self) {}
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for &M {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        (**self).predict(input)
    }

    fn release_cache(&self) {
        (**self).release_cache()
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        (**self).predict(input)
    }

    fn release_cache(&self) {
        (**self).release_cache()
    }
}

/// Calls [`SegmentationModel::release_cache`] when dropped.
#[must_use = "the cache is released when the guard is dropped"]
pub struct CacheReleaseGuard<'a, M: SegmentationModel + ?Sized> {
    model: &'a M,
}

impl<'a, M: SegmentationModel + ?Sized> CacheReleaseGuard<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a M {
        self.model
    }
}

impl<M: SegmentationModel + ?Sized> Drop for CacheReleaseGuard<'_, M> {
    fn drop(&mut self) {
        self.model.release_cache();
    }
}
