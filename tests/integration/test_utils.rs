//! Test utilities for integration tests.
//!
//! Deterministic models with call tracking, and helpers for building image
//! folders on disk.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::{s, Array3, Array4, ArrayView4};

use slidewin::{ModelError, SegmentationModel};

// =============================================================================
// Models
// =============================================================================

/// Returns the same value for every class and pixel.
pub struct ConstModel {
    pub value: f32,
    pub classes: usize,
}

impl SegmentationModel for ConstModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        let (n, _, h, w) = input.dim();
        Ok(Array4::from_elem((n, self.classes, h, w), self.value))
    }
}

/// Echoes the first input channel as a single class.
pub struct EchoModel;

impl SegmentationModel for EchoModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        Ok(input.slice(s![.., 0..1, .., ..]).to_owned())
    }
}

/// Fills the output with the index of the call, so merged values reveal
/// which windows contributed to each pixel.
#[derive(Default)]
pub struct CallIndexModel {
    calls: Cell<usize>,
}

impl SegmentationModel for CallIndexModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        let (n, _, h, w) = input.dim();
        let index = self.calls.get();
        self.calls.set(index + 1);
        Ok(Array4::from_elem((n, 1, h, w), index as f32))
    }
}

/// Records every predict and cache release, optionally failing on one call.
#[derive(Default)]
pub struct TrackingModel {
    pub fail_on_call: Option<usize>,
    pub input_shapes: RefCell<Vec<(usize, usize, usize, usize)>>,
    pub releases: Cell<usize>,
}

impl TrackingModel {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.input_shapes.borrow().len()
    }
}

impl SegmentationModel for TrackingModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Array4<f32>, ModelError> {
        let call = self.calls();
        self.input_shapes.borrow_mut().push(input.dim());
        if self.fail_on_call == Some(call) {
            return Err(ModelError::Backend("out of device memory".to_string()));
        }
        let (n, _, h, w) = input.dim();
        Ok(Array4::ones((n, 2, h, w)))
    }

    fn release_cache(&self) {
        self.releases.set(self.releases.get() + 1);
    }
}

// =============================================================================
// Images
// =============================================================================

/// Single-channel image whose value at `(y, x)` is `y * width + x`.
pub fn ramp_image(height: usize, width: usize) -> Array3<f32> {
    Array3::from_shape_fn((height, width, 1), |(y, x, _)| (y * width + x) as f32)
}

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "slidewin-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Image whose left `split` columns are `left` and the rest `right`.
pub fn split_image(width: u32, height: u32, split: u32, left: [u8; 3], right: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| if x < split { Rgb(left) } else { Rgb(right) })
}

pub fn save(img: &RgbImage, path: &Path) {
    img.save(path).expect("save test image");
}
